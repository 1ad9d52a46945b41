use crate::real::Real;

/// Bounded max-heap of `(index, distance)` pairs keeping the `capacity`
/// smallest distances seen.
#[derive(Debug)]
pub(crate) struct MaxHeap<T> {
    indices: Vec<usize>,
    distances: Vec<T>,
    capacity: usize,
}

impl<T: Real> MaxHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            distances: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Largest kept distance, or `T::max_value()` while the heap is not full
    pub fn max_dist(&self) -> T {
        if self.is_full() {
            self.distances[0]
        } else {
            T::max_value()
        }
    }

    pub fn insert(&mut self, index: usize, distance: T) {
        if !self.is_full() {
            self.indices.push(index);
            self.distances.push(distance);
            self.sift_up(self.len() - 1);
        } else if self.capacity > 0 && distance < self.distances[0] {
            self.indices[0] = index;
            self.distances[0] = distance;
            self.sift_down(0);
        }
    }

    /// Kept pairs by ascending distance
    pub fn into_sorted(self) -> Vec<(usize, T)> {
        let mut pairs: Vec<(usize, T)> = self.indices.into_iter().zip(self.distances).collect();
        pairs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.indices.swap(a, b);
        self.distances.swap(a, b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.distances[i] > self.distances[parent] {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.len();
        loop {
            let (left, right) = (2 * i + 1, 2 * i + 2);
            let mut largest = i;
            if left < n && self.distances[left] > self.distances[largest] {
                largest = left;
            }
            if right < n && self.distances[right] > self.distances[largest] {
                largest = right;
            }
            if largest == i {
                break;
            }
            self.swap(i, largest);
            i = largest;
        }
    }
}
