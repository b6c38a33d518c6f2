//! Request channel: non-authority → authority
//!
//! Non-authority не может писать в ReplicatedField напрямую. Вместо этого
//! intent ставится в очередь, authority забирает очередь и сам делает `set`,
//! дальше изменение расходится обычным replication path.

use std::collections::VecDeque;

use super::field::ReplicatedField;
use crate::net::PeerId;

#[derive(Debug, Clone, PartialEq)]
pub struct SetRequest<T> {
    pub requester: PeerId,
    pub value: T,
}

/// FIFO очередь запросов на изменение одного поля
#[derive(Debug, Clone)]
pub struct RequestChannel<T> {
    queue: VecDeque<SetRequest<T>>,
}

impl<T> Default for RequestChannel<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T> RequestChannel<T> {
    pub fn submit(&mut self, request: SetRequest<T>) {
        self.queue.push_back(request);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = SetRequest<T>> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Clone + PartialEq> RequestChannel<T> {
    /// Authority side: применить все запросы по порядку.
    ///
    /// Возвращает количество запросов, реально изменивших значение.
    pub fn process(&mut self, field: &mut ReplicatedField<T>) -> usize {
        let authority = field.authority();
        let mut applied = 0;
        for request in self.queue.drain(..) {
            match field.set(authority, request.value) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => crate::logger::log_warning(&format!(
                    "RequestChannel: request from {} dropped: {}",
                    request.requester, err
                )),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut field = ReplicatedField::new(0_u32, PeerId::SERVER);
        let mut channel = RequestChannel::default();
        channel.submit(SetRequest { requester: PeerId(1), value: 5 });
        channel.submit(SetRequest { requester: PeerId(2), value: 7 });

        assert_eq!(channel.process(&mut field), 2);
        // Последний запрос побеждает
        assert_eq!(*field.get(), 7);
        assert_eq!(field.sequence(), 2);
        assert!(channel.is_empty());
    }
}
