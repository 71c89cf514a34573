//! Minimal edit scripts between ordered sequences
//!
//! Myers' O((N+M)·D) shortest-edit-script algorithm, preceded by trimming the
//! common prefix and suffix. The kept elements form a longest common
//! subsequence of the inputs.

/// Positions deleted from the old sequence and inserted into the new one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    /// Indices into the old sequence, ascending
    pub deletions: Vec<usize>,
    /// Indices into the new sequence, ascending
    pub insertions: Vec<usize>,
}

impl EditScript {
    /// Whether both sequences are equal
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty()
    }

    /// Number of edits
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletions.len() + self.insertions.len()
    }
}

/// Compute a minimal edit script turning `old` into `new`
#[must_use]
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> EditScript {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut script = EditScript::default();
    myers(old_mid, new_mid, prefix, &mut script);
    script.deletions.sort_unstable();
    script.insertions.sort_unstable();
    script
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn myers<T: PartialEq>(old: &[T], new: &[T], base: usize, script: &mut EditScript) {
    let n = old.len() as isize;
    let m = new.len() as isize;

    if n == 0 {
        script.insertions.extend((0..new.len()).map(|i| base + i));
        return;
    }
    if m == 0 {
        script.deletions.extend((0..old.len()).map(|i| base + i));
        return;
    }

    let max = n + m;
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    // trace[d] holds v[-d-1 ..= d+1] as it was before step d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    let mut last_d = 0;
    'search: for d in 0..=max {
        let lo = (offset - d - 1) as usize;
        let hi = (offset + d + 1) as usize;
        trace.push(v[lo..=hi].to_vec());

        let mut k = -d;
        while k <= d {
            let idx = (offset + k) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                last_d = d;
                break 'search;
            }
            k += 2;
        }
    }

    let (mut x, mut y) = (n, m);
    for d in (0..=last_d).rev() {
        let snapshot = &trace[d as usize];
        let at = |k: isize| snapshot[(k + d + 1) as usize];

        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
        }

        if d > 0 {
            if x == prev_x {
                script.insertions.push(base + prev_y as usize);
            } else {
                script.deletions.push(base + prev_x as usize);
            }
        }

        x = prev_x;
        y = prev_y;
    }
}
