//! Fixed-width feature matrices
//!
//! Sequence models take a rectangular batch of token ids. Short sequences are
//! left-padded with 0 and long ones keep their trailing ids, so the most
//! recent n-grams always survive.

/// Value used for left padding (coincides with the unknown id)
pub const PAD_ID: u32 = 0;

/// Row-major (batch, length) matrix of token ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMatrix {
    data: Vec<u32>,
    rows: usize,
    width: usize,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> &[u32] {
        &self.data[index * self.width..(index + 1) * self.width]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[u32]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Largest id in the matrix (0 for an empty matrix)
    pub fn max_id(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(PAD_ID)
    }
}

/// Pad or truncate every sequence to exactly `max_len` ids
pub fn pad<S: AsRef<[u32]>>(sequences: &[S], max_len: usize) -> FeatureMatrix {
    let mut data = Vec::with_capacity(sequences.len() * max_len);
    for seq in sequences {
        let seq = seq.as_ref();
        if seq.len() >= max_len {
            data.extend_from_slice(&seq[seq.len() - max_len..]);
        } else {
            data.extend(std::iter::repeat(PAD_ID).take(max_len - seq.len()));
            data.extend_from_slice(seq);
        }
    }
    FeatureMatrix {
        data,
        rows: sequences.len(),
        width: max_len,
    }
}
