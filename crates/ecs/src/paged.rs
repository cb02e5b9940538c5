/// Entries per page.
pub(crate) const PAGE_SIZE: usize = 4096;

/// Index-addressed array that only allocates the pages actually written.
///
/// Reading an index on a missing page yields `None`; writing allocates its
/// page filled with `fill`. The page table grows with the highest index
/// touched, one pointer per page.
#[derive(Debug, Clone)]
pub(crate) struct PagedVec<T> {
    pages: Vec<Option<Box<[T]>>>,
    fill: T,
}

impl<T: Clone> PagedVec<T> {
    pub(crate) fn new(fill: T) -> Self {
        Self {
            pages: Vec::new(),
            fill,
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        let page = self.pages.get(index / PAGE_SIZE)?.as_ref()?;
        page.get(index % PAGE_SIZE)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let page = self.pages.get_mut(index / PAGE_SIZE)?.as_mut()?;
        page.get_mut(index % PAGE_SIZE)
    }

    /// Slot at `index`, allocating its page.
    pub(crate) fn entry(&mut self, index: usize) -> &mut T {
        let page = index / PAGE_SIZE;
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let fill = &self.fill;
        let page = self.pages[page]
            .get_or_insert_with(|| vec![fill.clone(); PAGE_SIZE].into_boxed_slice());
        &mut page[index % PAGE_SIZE]
    }

    /// `(index, value)` for every slot of every allocated page, ascending.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(page, slots)| Some((page, slots.as_ref()?)))
            .flat_map(|(page, slots)| {
                slots
                    .iter()
                    .enumerate()
                    .map(move |(offset, value)| (page * PAGE_SIZE + offset, value))
            })
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }

    pub(crate) fn clear(&mut self) {
        self.pages.clear();
    }
}
