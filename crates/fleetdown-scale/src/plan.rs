//! Batch slicing of the candidate list.

/// A contiguous slice of the candidate list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Batch {
    /// 1-based position in the plan.
    pub index: u32,
    pub arns: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> u32 {
        self.arns.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.arns.is_empty()
    }
}

/// Batches to process, in candidate order.
///
/// A batch starts at every multiple of `batch_size` below both the
/// candidate count and `max_to_remove`. Every batch is full except
/// possibly the last.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchPlan {
    pub batch_size: u32,
    pub max_to_remove: u32,
    pub batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn new(candidates: &[String], batch_size: u32, max_to_remove: u32) -> Self {
        let step = batch_size.max(1) as usize;
        let limit = candidates.len().min(max_to_remove as usize);

        let batches = (0..limit)
            .step_by(step)
            .zip(1u32..)
            .map(|(start, index)| {
                let end = (start + step).min(candidates.len());
                Batch {
                    index,
                    arns: candidates[start..end].to_vec(),
                }
            })
            .collect();

        Self {
            batch_size,
            max_to_remove,
            batches,
        }
    }

    pub fn len(&self) -> u32 {
        self.batches.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arns(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("arn:ci/{i}")).collect()
    }

    #[test]
    fn single_instance_batches() {
        let plan = BatchPlan::new(&arns(2), 1, 2);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.batches[0].arns, vec!["arn:ci/0"]);
        assert_eq!(plan.batches[1].arns, vec!["arn:ci/1"]);
        assert_eq!(plan.batches[1].index, 2);
    }

    #[test]
    fn last_batch_may_be_smaller() {
        let plan = BatchPlan::new(&arns(9), 4, 9);
        let sizes: Vec<u32> = plan.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
    }

    #[test]
    fn batches_are_contiguous_and_ordered() {
        let candidates = arns(7);
        let plan = BatchPlan::new(&candidates, 3, 7);
        let flattened: Vec<String> = plan
            .batches
            .iter()
            .flat_map(|b| b.arns.iter().cloned())
            .collect();
        assert_eq!(flattened, candidates);
    }

    #[test]
    fn headroom_limits_batch_starts() {
        // Only 3 may be removed: batches start at 0 and 2; the second one
        // is still a full batch.
        let plan = BatchPlan::new(&arns(10), 2, 3);
        let sizes: Vec<u32> = plan.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2]);
    }

    #[test]
    fn no_headroom_no_batches() {
        assert!(BatchPlan::new(&arns(4), 2, 0).is_empty());
        assert!(BatchPlan::new(&[], 2, 5).is_empty());
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        let plan = BatchPlan::new(&arns(3), 0, 3);
        let sizes: Vec<u32> = plan.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }
}
