//! Hartigan-Wong k-means (Applied Statistics algorithm AS 136).
//!
//! Each sample tracks its closest (`ic1`) and second closest (`ic2`)
//! cluster. The optimal-transfer stage moves a sample to whichever cluster
//! most reduces the within-cluster sum of squares, restricted to the "live
//! set" of clusters updated recently. The quick-transfer stage only
//! considers swapping each sample between `ic1` and `ic2`. Transfer costs
//! use the factors `an1 = n / (n - 1)` and `an2 = n / (n + 1)`.
//!
//! Step counters are 1-based, as the live-set and update-step bookkeeping
//! compares them against each other.

use super::state::Dataset;
use crate::error::Result;
use crate::real::Real;
use ndarray::{Array2, ArrayView2};

/// Summary of one Hartigan-Wong run
#[derive(Debug, Clone, Copy)]
pub(crate) struct HartiganWongOutcome<T> {
    pub n_iter: usize,
    pub converged: bool,
    pub inertia: T,
}

/// Quick-transfer stages give up after this many steps per sample.
const QUICK_TRANSFER_STEPS_PER_SAMPLE: usize = 50;

struct HartiganWong<'a, 'd, T> {
    data: &'a Dataset<'d, T>,
    n_samples: usize,
    n_features: usize,
    n_clusters: usize,
    big: T,
    /// Centres, row `l` at `c[l * n_features..]`
    c: Vec<T>,
    ic1: Vec<usize>,
    ic2: Vec<usize>,
    nc: Vec<usize>,
    an1: Vec<T>,
    an2: Vec<T>,
    /// Step at which each cluster was last updated (offset by `n_samples`
    /// during the quick-transfer stage)
    ncp: Vec<isize>,
    /// Cost of removing each sample from its cluster
    d: Vec<T>,
    itran: Vec<bool>,
    live: Vec<isize>,
    indx: usize,
}

/// Run Hartigan-Wong from the given centres.
///
/// On return `centres` holds the cluster means and `labels` the closest
/// cluster of each sample. Requires `1 < n_clusters < n_samples`.
pub(crate) fn hartigan_wong<T: Real>(
    data: &Dataset<T>,
    centres: &mut Array2<T>,
    labels: &mut [usize],
    max_iter: usize,
) -> Result<HartiganWongOutcome<T>> {
    let n_clusters = centres.nrows();
    let mut hw = HartiganWong {
        data,
        n_samples: data.n_samples,
        n_features: data.n_features,
        n_clusters,
        big: T::from_f64(1e30),
        c: centres.iter().copied().collect(),
        ic1: vec![0; data.n_samples],
        ic2: vec![1; data.n_samples],
        nc: vec![0; n_clusters],
        an1: vec![T::zero(); n_clusters],
        an2: vec![T::zero(); n_clusters],
        ncp: vec![-1; n_clusters],
        d: vec![T::zero(); data.n_samples],
        itran: vec![true; n_clusters],
        live: vec![0; n_clusters],
        indx: 0,
    };

    hw.initial_assignment();
    hw.form_means();

    let (n_iter, converged) = if hw.nc.iter().any(|&n| n == 0) {
        tracing::debug!("empty cluster after the initial assignment, skipping transfers");
        (0, true)
    } else {
        hw.iterate(max_iter)
    };

    let inertia = hw.finish();
    labels.copy_from_slice(&hw.ic1);
    centres.assign(&ArrayView2::from_shape((n_clusters, hw.n_features), &hw.c)?);

    Ok(HartiganWongOutcome {
        n_iter,
        converged,
        inertia,
    })
}

impl<T: Real> HartiganWong<'_, '_, T> {
    #[inline]
    fn value(&self, i: usize, j: usize) -> T {
        self.data.raw[i + j * self.n_samples]
    }

    fn distance(&self, i: usize, l: usize) -> T {
        self.data
            .squared_distance_to(i, &self.c[l * self.n_features..(l + 1) * self.n_features])
    }

    /// Squared distance from sample `i` to centre `l`, or `None` as soon as
    /// the partial sum reaches `bound`.
    fn distance_below(&self, i: usize, l: usize, bound: T) -> Option<T> {
        let centre = &self.c[l * self.n_features..(l + 1) * self.n_features];
        let mut acc = T::zero();
        for (j, &c) in centre.iter().enumerate() {
            let diff = self.value(i, j) - c;
            acc += diff * diff;
            if acc >= bound {
                return None;
            }
        }
        Some(acc)
    }

    /// Closest and second closest centre of every sample.
    fn initial_assignment(&mut self) {
        for i in 0..self.n_samples {
            let (mut ic1, mut ic2) = (0, 1);
            let mut dt = [self.distance(i, 0), self.distance(i, 1)];
            if dt[0] > dt[1] {
                (ic1, ic2) = (1, 0);
                dt.swap(0, 1);
            }
            for l in 2..self.n_clusters {
                let Some(db) = self.distance_below(i, l, dt[1]) else {
                    continue;
                };
                if db < dt[0] {
                    dt[1] = dt[0];
                    ic2 = ic1;
                    dt[0] = db;
                    ic1 = l;
                } else {
                    dt[1] = db;
                    ic2 = l;
                }
            }
            self.ic1[i] = ic1;
            self.ic2[i] = ic2;
        }
    }

    /// Centres become the means of their members; empty ones are zero.
    fn form_means(&mut self) {
        let f = self.n_features;
        self.c.fill(T::zero());
        self.nc.fill(0);
        for i in 0..self.n_samples {
            let l = self.ic1[i];
            self.nc[l] += 1;
            for j in 0..f {
                let v = self.value(i, j);
                self.c[l * f + j] += v;
            }
        }
        for l in 0..self.n_clusters {
            if self.nc[l] == 0 {
                continue;
            }
            let aa = T::from_usize(self.nc[l]);
            for v in &mut self.c[l * f..(l + 1) * f] {
                *v /= aa;
            }
        }
    }

    /// Alternate optimal and quick transfers. Returns `(n_iter, converged)`.
    fn iterate(&mut self, max_iter: usize) -> (usize, bool) {
        let one = T::one();
        for l in 0..self.n_clusters {
            let aa = T::from_usize(self.nc[l]);
            self.an2[l] = aa / (aa + one);
            self.an1[l] = if aa > one { aa / (aa - one) } else { self.big };
        }

        for iteration in 1..=max_iter {
            self.optimal_transfer();
            // no transfer during the last n_samples steps
            if self.indx == self.n_samples {
                return (iteration, true);
            }

            if !self.quick_transfer() {
                tracing::warn!(iteration, "quick-transfer stage hit its step limit");
                return (iteration, false);
            }

            if self.n_clusters == 2 {
                return (iteration, true);
            }
            self.ncp.fill(0);
        }
        (max_iter, false)
    }

    fn optimal_transfer(&mut self) {
        let m = self.n_samples as isize;
        for l in 0..self.n_clusters {
            if self.itran[l] {
                self.live[l] = m + 1;
            }
        }

        for i in 0..self.n_samples {
            let step = i as isize + 1;
            self.indx += 1;
            let l1 = self.ic1[i];

            if self.nc[l1] != 1 {
                // l1 moved in this stage, so the removal cost is stale
                if self.ncp[l1] != 0 {
                    self.d[i] = self.distance(i, l1) * self.an1[l1];
                }

                let ll = self.ic2[i];
                let mut l2 = ll;
                let mut r2 = self.distance(i, ll) * self.an2[ll];
                for l in 0..self.n_clusters {
                    // once l1 has left the live set only live clusters can take the sample
                    if (step >= self.live[l1] && step >= self.live[l]) || l == l1 || l == ll {
                        continue;
                    }
                    let rr = r2 / self.an2[l];
                    if let Some(dc) = self.distance_below(i, l, rr) {
                        r2 = dc * self.an2[l];
                        l2 = l;
                    }
                }

                if r2 >= self.d[i] {
                    self.ic2[i] = l2;
                } else {
                    self.indx = 0;
                    self.live[l1] = m + step;
                    self.live[l2] = m + step;
                    self.ncp[l1] = step;
                    self.ncp[l2] = step;
                    self.transfer(i, l1, l2);
                }
            }

            if self.indx == self.n_samples {
                return;
            }
        }

        for l in 0..self.n_clusters {
            self.itran[l] = false;
            self.live[l] -= m;
        }
    }

    /// Returns `false` when the step limit is reached before the stage
    /// settles.
    fn quick_transfer(&mut self) -> bool {
        let m = self.n_samples as isize;
        let max_steps = (QUICK_TRANSFER_STEPS_PER_SAMPLE * self.n_samples) as isize;
        let mut icoun = 0;
        let mut istep: isize = 0;

        loop {
            for i in 0..self.n_samples {
                icoun += 1;
                istep += 1;
                if istep >= max_steps {
                    return false;
                }
                let (l1, l2) = (self.ic1[i], self.ic2[i]);

                if self.nc[l1] != 1 {
                    if istep <= self.ncp[l1] {
                        self.d[i] = self.distance(i, l1) * self.an1[l1];
                    }
                    if istep < self.ncp[l1] || istep < self.ncp[l2] {
                        let r2 = self.d[i] / self.an2[l2];
                        if self.distance_below(i, l2, r2).is_some() {
                            icoun = 0;
                            self.indx = 0;
                            self.itran[l1] = true;
                            self.itran[l2] = true;
                            self.ncp[l1] = istep + m;
                            self.ncp[l2] = istep + m;
                            self.transfer(i, l1, l2);
                        }
                    }
                }

                if icoun == self.n_samples {
                    return true;
                }
            }
        }
    }

    /// Move sample `i` from cluster `l1` to `l2`, updating both means and
    /// their cost factors.
    fn transfer(&mut self, i: usize, l1: usize, l2: usize) {
        let f = self.n_features;
        let one = T::one();
        let al1 = T::from_usize(self.nc[l1]);
        let alw = al1 - one;
        let al2 = T::from_usize(self.nc[l2]);
        let alt = al2 + one;

        for j in 0..f {
            let a = self.value(i, j);
            self.c[l1 * f + j] = (self.c[l1 * f + j] * al1 - a) / alw;
            self.c[l2 * f + j] = (self.c[l2 * f + j] * al2 + a) / alt;
        }
        self.nc[l1] -= 1;
        self.nc[l2] += 1;

        self.an2[l1] = alw / al1;
        self.an1[l1] = if alw > one { alw / (alw - one) } else { self.big };
        self.an1[l2] = alt / al2;
        self.an2[l2] = alt / (alt + one);

        self.ic1[i] = l2;
        self.ic2[i] = l1;
    }

    /// Recompute the means from scratch and return the total within-cluster
    /// sum of squares.
    fn finish(&mut self) -> T {
        self.form_means();
        let mut wss = vec![T::zero(); self.n_clusters];
        for i in 0..self.n_samples {
            let l = self.ic1[i];
            wss[l] += self.distance(i, l);
        }
        wss.into_iter().sum()
    }
}
