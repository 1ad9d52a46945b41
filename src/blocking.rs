use std::ops::Range;

/// Rows per block for the Lloyd iteration and `predict`
pub const KMEANS_LLOYD_BLOCK_SIZE: usize = 256;
/// Rows per block for the Elkan iteration
pub const KMEANS_ELKAN_BLOCK_SIZE: usize = 256;
/// Rows per block for the MacQueen initial assignment
pub const KMEANS_MACQUEEN_BLOCK_SIZE: usize = 256;

/// Split `n` rows into blocks of at most `max_block_size` rows.
///
/// Returns `(n_blocks, remainder)`: all blocks hold `max_block_size` rows
/// except the last one, which holds `remainder` rows when `remainder > 0`.
/// When `n <= max_block_size` there is exactly one block.
pub fn blocking_scheme(n: usize, max_block_size: usize) -> (usize, usize) {
    let max_block_size = max_block_size.max(1);
    if n <= max_block_size {
        let remainder = if n < max_block_size { n } else { 0 };
        return (1, remainder);
    }
    (n.div_ceil(max_block_size), n % max_block_size)
}

/// Number of worker threads worth using for `n_blocks` independent blocks.
///
/// Each worker owns whole blocks, so there is never more workers than blocks.
pub fn thread_count_for(n_blocks: usize) -> usize {
    rayon::current_num_threads().min(n_blocks).max(1)
}

/// Row partition shared by the blocked kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocking {
    pub n_rows: usize,
    pub block_size: usize,
    pub n_blocks: usize,
}

impl Blocking {
    pub fn new(n_rows: usize, max_block_size: usize) -> Self {
        let block_size = max_block_size.min(n_rows).max(1);
        let (n_blocks, _) = blocking_scheme(n_rows, block_size);
        Self {
            n_rows,
            block_size,
            n_blocks,
        }
    }

    /// Row range covered by block `b`
    #[inline]
    pub fn block(&self, b: usize) -> Range<usize> {
        let start = b * self.block_size;
        start..(start + self.block_size).min(self.n_rows)
    }

    pub fn n_threads(&self) -> usize {
        thread_count_for(self.n_blocks)
    }

    /// Minimum number of blocks handed to one rayon task. With a single
    /// worker all blocks go to one task, which runs them in order.
    pub fn min_task_len(&self) -> usize {
        if self.n_threads() > 1 {
            1
        } else {
            self.n_blocks.max(1)
        }
    }
}
