//! Intrusive doubly-linked list over slot indices.
//!
//! Links live in two parallel vectors so that unlinking, appending and
//! move-to-back are O(1) without per-node allocation.

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct OrderList {
    prev: Vec<usize>,
    next: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl OrderList {
    pub(super) fn with_slots(slots: usize) -> Self {
        Self {
            prev: vec![NIL; slots],
            next: vec![NIL; slots],
            head: None,
            tail: None,
        }
    }

    pub(super) const fn front(&self) -> Option<usize> {
        self.head
    }

    pub(super) fn push_back(&mut self, slot: usize) {
        self.prev[slot] = self.tail.unwrap_or(NIL);
        self.next[slot] = NIL;
        match self.tail {
            Some(tail) => self.next[tail] = slot,
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    pub(super) fn unlink(&mut self, slot: usize) {
        let prev = self.prev[slot];
        let next = self.next[slot];
        if prev == NIL {
            self.head = (next != NIL).then_some(next);
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = (prev != NIL).then_some(prev);
        } else {
            self.prev[next] = prev;
        }
        self.prev[slot] = NIL;
        self.next[slot] = NIL;
    }

    pub(super) fn move_to_back(&mut self, slot: usize) {
        if self.tail == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_back(slot);
    }

    pub(super) fn iter(&self) -> OrderIter<'_> {
        OrderIter {
            list: self,
            cursor: self.head,
        }
    }
}

pub(super) struct OrderIter<'a> {
    list: &'a OrderList,
    cursor: Option<usize>,
}

impl Iterator for OrderIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = self.cursor?;
        let next = self.list.next[slot];
        self.cursor = (next != NIL).then_some(next);
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::OrderList;

    fn filled(n: usize) -> OrderList {
        let mut list = OrderList::with_slots(n);
        for slot in 0..n {
            list.push_back(slot);
        }
        list
    }

    #[test]
    fn push_back_preserves_insertion_order() {
        let list = filled(4);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(list.front(), Some(0));
    }

    #[test]
    fn move_to_back_relinks_head_middle_and_tail() {
        let mut list = filled(4);
        list.move_to_back(0);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1, 2, 3, 0]);
        list.move_to_back(2);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1, 3, 0, 2]);
        list.move_to_back(2);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1, 3, 0, 2]);
        assert_eq!(list.front(), Some(1));
    }

    #[test]
    fn unlinking_everything_empties_the_list() {
        let mut list = filled(3);
        list.unlink(1);
        list.unlink(0);
        list.unlink(2);
        assert_eq!(list.front(), None);
        assert_eq!(list.iter().count(), 0);
        list.push_back(1);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1]);
    }
}
