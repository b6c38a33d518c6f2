//! Waypoint traversal для движущихся платформ

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Что делать в конце пути
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Reflect)]
pub enum PathMode {
    /// N-1 → 0 → 1 ...
    #[default]
    Loop,
    /// 0 → N-1 → 0 ..., разворот ровно на концах
    PingPong,
    /// 0 → N-1 и стоп
    Once,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub struct WaypointPath {
    pub points: Vec<Vec3>,
    pub mode: PathMode,
    /// m/s
    pub speed: f32,
    /// Пауза на каждом waypoint (sec)
    #[serde(default)]
    pub dwell: f32,
}

impl WaypointPath {
    pub fn new(points: Vec<Vec3>, mode: PathMode, speed: f32) -> Self {
        Self {
            points,
            mode,
            speed,
            dwell: 0.0,
        }
    }

    pub fn with_dwell(mut self, dwell: f32) -> Self {
        self.dwell = dwell.max(0.0);
        self
    }
}

/// Runtime состояние платформы на пути
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct PlatformMover {
    pub path: WaypointPath,
    position: Vec3,
    /// Индекс waypoint'а, к которому едем
    target: usize,
    /// +1 вперёд, -1 назад (PingPong)
    direction: i8,
    dwell_remaining: f32,
    finished: bool,
    last_delta: Vec3,
}

impl PlatformMover {
    pub fn new(path: WaypointPath) -> Self {
        let position = path.points.first().copied().unwrap_or(Vec3::ZERO);
        let target = if path.points.len() > 1 { 1 } else { 0 };
        if path.points.is_empty() {
            crate::logger::log_warning("PlatformMover: empty waypoint path, platform will stay put");
        }
        Self {
            path,
            position,
            target,
            direction: 1,
            dwell_remaining: 0.0,
            finished: false,
            last_delta: Vec3::ZERO,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn current_target(&self) -> usize {
        self.target
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Смещение за последний тик (для riders)
    pub fn last_delta(&self) -> Vec3 {
        self.last_delta
    }

    /// Продвинуться на dt. Возвращает смещение за тик.
    pub fn tick(&mut self, dt: f32) -> Vec3 {
        let start = self.position;
        let count = self.path.points.len();

        if count < 2 || self.finished || !(dt > 0.0) || !(self.path.speed > 0.0) {
            self.last_delta = Vec3::ZERO;
            return Vec3::ZERO;
        }

        let mut time_left = dt;
        if self.dwell_remaining > 0.0 {
            let waited = self.dwell_remaining.min(time_left);
            self.dwell_remaining -= waited;
            time_left -= waited;
        }

        let mut budget = self.path.speed * time_left;
        // Ограничение итераций: при огромном dt не крутимся бесконечно по короткому loop'у
        let mut guard = count * 4;
        while budget > 0.0 && !self.finished && self.dwell_remaining <= 0.0 && guard > 0 {
            guard -= 1;
            let goal = self.path.points[self.target];
            let to_goal = goal - self.position;
            let distance = to_goal.length();

            if distance <= budget {
                self.position = goal;
                budget -= distance;
                self.advance();
                if self.path.dwell > 0.0 {
                    self.dwell_remaining = self.path.dwell;
                }
            } else {
                self.position += to_goal / distance * budget;
                budget = 0.0;
            }
        }

        self.last_delta = self.position - start;
        self.last_delta
    }

    /// Observer side: платформу двигает authority, позиция приходит через replication
    pub fn follow(&mut self, position: Vec3) -> Vec3 {
        self.last_delta = if position.is_finite() { position - self.position } else { Vec3::ZERO };
        if position.is_finite() {
            self.position = position;
        }
        self.last_delta
    }

    /// Следующий target после прибытия в текущий
    fn advance(&mut self) {
        let last = self.path.points.len() - 1;
        match self.path.mode {
            PathMode::Loop => {
                self.target = (self.target + 1) % (last + 1);
            }
            PathMode::PingPong => {
                if self.direction > 0 && self.target == last {
                    self.direction = -1;
                } else if self.direction < 0 && self.target == 0 {
                    self.direction = 1;
                }
                self.target = if self.direction > 0 {
                    self.target + 1
                } else {
                    self.target - 1
                };
            }
            PathMode::Once => {
                if self.target == last {
                    self.finished = true;
                } else {
                    self.target += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: usize) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_ping_pong_reverses_exactly_at_ends() {
        let count = 4;
        let mut mover = PlatformMover::new(WaypointPath::new(line(count), PathMode::PingPong, 3.0));

        let mut targets = vec![mover.current_target()];
        for _ in 0..600 {
            mover.tick(1.0 / 60.0);
            assert!(mover.current_target() < count);
            assert!(mover.position().x >= -1e-4 && mover.position().x <= (count - 1) as f32 + 1e-4);
            if targets.last() != Some(&mover.current_target()) {
                targets.push(mover.current_target());
            }
        }

        // 1 2 3 2 1 0 1 2 3 ...
        assert_eq!(&targets[..9], &[1, 2, 3, 2, 1, 0, 1, 2, 3]);
    }

    #[test]
    fn test_ping_pong_direction_flips_only_at_bounds() {
        let count = 3;
        let mut mover = PlatformMover::new(WaypointPath::new(line(count), PathMode::PingPong, 5.0));
        let mut last_direction = mover.direction();

        for _ in 0..600 {
            let before = mover.current_target();
            mover.tick(1.0 / 60.0);
            if mover.direction() != last_direction {
                // Разворот только после прибытия в 0 или N-1
                assert!(before == 0 || before == count - 1, "flip after target {}", before);
                last_direction = mover.direction();
            }
        }
    }

    #[test]
    fn test_loop_wraps() {
        let mut mover = PlatformMover::new(WaypointPath::new(line(3), PathMode::Loop, 1.0));
        // 0→1→2 = 2m, 2→0 = 2m
        mover.tick(2.0);
        assert_eq!(mover.current_target(), 0);
        mover.tick(2.0);
        assert_eq!(mover.current_target(), 1);
        assert!(mover.position().x.abs() < 1e-5);
    }

    #[test]
    fn test_once_stops_at_end() {
        let mut mover = PlatformMover::new(WaypointPath::new(line(3), PathMode::Once, 1.0));
        mover.tick(10.0);
        assert!(mover.is_finished());
        assert_eq!(mover.position(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(mover.tick(1.0), Vec3::ZERO);
    }

    #[test]
    fn test_dwell_pauses_at_waypoint() {
        let path = WaypointPath::new(line(2), PathMode::PingPong, 1.0).with_dwell(0.5);
        let mut mover = PlatformMover::new(path);

        mover.tick(1.0);
        assert_eq!(mover.position(), Vec3::new(1.0, 0.0, 0.0));
        // Стоим
        assert_eq!(mover.tick(0.25), Vec3::ZERO);
        // 0.25 sec паузы + 0.25 sec движения назад
        let delta = mover.tick(0.5);
        assert!((delta.x + 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_delta_matches_position_change() {
        let mut mover = PlatformMover::new(WaypointPath::new(line(2), PathMode::Loop, 2.0));
        let before = mover.position();
        let delta = mover.tick(0.1);
        assert_eq!(mover.position() - before, delta);
        assert_eq!(mover.last_delta(), delta);
    }

    #[test]
    fn test_follow_reports_replicated_delta() {
        let mut mover = PlatformMover::new(WaypointPath::new(line(2), PathMode::Loop, 2.0));
        assert_eq!(mover.follow(Vec3::new(0.25, 0.0, 0.0)), Vec3::new(0.25, 0.0, 0.0));
        assert_eq!(mover.position(), Vec3::new(0.25, 0.0, 0.0));
        assert_eq!(mover.follow(Vec3::NAN), Vec3::ZERO);
        assert_eq!(mover.position(), Vec3::new(0.25, 0.0, 0.0));
    }

    #[test]
    fn test_degenerate_paths() {
        let mut empty = PlatformMover::new(WaypointPath::new(Vec::new(), PathMode::Loop, 1.0));
        assert_eq!(empty.tick(1.0), Vec3::ZERO);

        let mut single = PlatformMover::new(WaypointPath::new(vec![Vec3::ONE], PathMode::PingPong, 1.0));
        assert_eq!(single.tick(1.0), Vec3::ZERO);
        assert_eq!(single.position(), Vec3::ONE);
    }
}
