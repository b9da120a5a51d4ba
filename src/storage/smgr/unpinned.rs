/// Ordered set of unpinned relation handles, identified by their slot on the
/// registry arena.
///
/// This is a doubly linked list threaded through a vector indexed by slot,
/// so that both [pin](UnpinnedList::pin) and [unpin](UnpinnedList::unpin)
/// are O(1) and handles are destroyed in the order they became unpinned.
#[derive(Debug, Default)]
pub(crate) struct UnpinnedList {
    links: Vec<Link>,
    head: Option<u32>,
    tail: Option<u32>,
    size: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Link {
    linked: bool,
    prev: Option<u32>,
    next: Option<u32>,
}

impl UnpinnedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            links: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Remove the slot from the list.
    ///
    /// Called when the pin count of a handle leaves 0. Return false if the
    /// slot was not on the list.
    pub fn pin(&mut self, slot: u32) -> bool {
        let link = match self.links.get(slot as usize) {
            Some(link) if link.linked => *link,
            _ => return false,
        };

        match link.prev {
            Some(prev) => self.links[prev as usize].next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => self.links[next as usize].prev = link.prev,
            None => self.tail = link.prev,
        }

        self.links[slot as usize] = Link::default();
        self.size -= 1;
        true
    }

    /// Append the slot at the tail of the list.
    ///
    /// Called when the pin count of a handle becomes 0. Return false if the
    /// slot was already on the list.
    pub fn unpin(&mut self, slot: u32) -> bool {
        if self.contains(slot) {
            return false;
        }
        if self.links.len() <= slot as usize {
            self.links.resize(slot as usize + 1, Link::default());
        }

        self.links[slot as usize] = Link {
            linked: true,
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => self.links[tail as usize].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.size += 1;
        true
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.links
            .get(slot as usize)
            .map(|link| link.linked)
            .unwrap_or(false)
    }

    /// Returns the number of slots that are currently on the list.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Return the slots on the list, from head to tail.
    pub fn slots(&self) -> Vec<u32> {
        let mut slots = Vec::with_capacity(self.size);
        let mut cur = self.head;
        while let Some(slot) = cur {
            slots.push(slot);
            cur = self.links[slot as usize].next;
        }
        slots
    }
}
