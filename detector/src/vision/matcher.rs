use super::orb::Descriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
}

/// Brute-force Hamming matching keeping only mutual nearest neighbours.
pub fn match_cross_checked(query: &[Descriptor], train: &[Descriptor]) -> Vec<DescriptorMatch> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }
    let backward: Vec<usize> = train.iter().map(|t| nearest(t, query)).collect();

    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let ti = nearest(q, train);
            (backward[ti] == qi).then_some(DescriptorMatch { query: qi, train: ti })
        })
        .collect()
}

/// Index of the closest candidate; ties go to the lower index.
fn nearest(needle: &Descriptor, candidates: &[Descriptor]) -> usize {
    let mut best = (0, u32::MAX);
    for (idx, candidate) in candidates.iter().enumerate() {
        let d = needle.hamming(candidate);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best.0
}
