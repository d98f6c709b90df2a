//! Coin selection over compressed accounts.
//!
//! Selection is minimal-cardinality: the number of inputs `k` is the smallest
//! count whose `k` largest accounts cover the target. Within that count the
//! last slot is filled best-fit, with the smallest account that still covers
//! the remainder, so change stays small. Ties are broken by hash, which keeps
//! the result reproducible for a given account set.

use thiserror::Error;

use crate::indexer::{CompressedAccount, CompressedTokenAccount, Hash};

pub trait SelectableAccount {
    fn amount(&self) -> u64;
    fn hash(&self) -> &Hash;
}

impl SelectableAccount for CompressedAccount {
    fn amount(&self) -> u64 {
        self.lamports
    }

    fn hash(&self) -> &Hash {
        &self.hash
    }
}

impl SelectableAccount for CompressedTokenAccount {
    fn amount(&self) -> u64 {
        self.token.amount
    }

    fn hash(&self) -> &Hash {
        &self.account.hash
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T> {
    pub inputs: Vec<T>,
    pub total: u64,
    pub change_amount: u64,
}

impl<T: SelectableAccount> Selection<T> {
    pub fn hashes(&self) -> Vec<Hash> {
        self.inputs.iter().map(|input| *input.hash()).collect()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Amount must be greater than 0")]
    InvalidTarget,

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("Covering {requested} needs {required} inputs, at most {max} fit in one transaction")]
    TooManyInputs {
        requested: u64,
        required: usize,
        max: usize,
    },
}

pub fn select<T>(
    accounts: &[T],
    target: u64,
    max_inputs: usize,
) -> Result<Selection<T>, SelectionError>
where
    T: SelectableAccount + Clone,
{
    if target == 0 {
        return Err(SelectionError::InvalidTarget);
    }

    let mut candidates: Vec<&T> = accounts.iter().filter(|a| a.amount() > 0).collect();
    candidates.sort_by(|a, b| b.amount().cmp(&a.amount()).then_with(|| a.hash().cmp(b.hash())));

    let available: u128 = candidates.iter().map(|a| a.amount() as u128).sum();
    if available < target as u128 {
        return Err(SelectionError::InsufficientFunds {
            requested: target,
            available: u64::try_from(available).unwrap_or(u64::MAX),
        });
    }

    let mut covered: u128 = 0;
    let mut required = 0;
    for candidate in &candidates {
        covered += candidate.amount() as u128;
        required += 1;
        if covered >= target as u128 {
            break;
        }
    }
    if required > max_inputs {
        return Err(SelectionError::TooManyInputs {
            requested: target,
            required,
            max: max_inputs,
        });
    }

    let prefix = &candidates[..required - 1];
    let prefix_sum: u128 = prefix.iter().map(|a| a.amount() as u128).sum();
    let remainder = target as u128 - prefix_sum;

    // Candidates after the prefix are sorted descending, so the qualifying
    // ones form a contiguous run starting at `required - 1`.
    let tail = &candidates[required - 1..];
    let last_fit = tail
        .iter()
        .take_while(|a| a.amount() as u128 >= remainder)
        .count();
    let smallest_fit = tail[last_fit - 1].amount();
    let best = tail
        .iter()
        .find(|a| a.amount() == smallest_fit)
        .copied()
        .unwrap_or(tail[0]);

    let mut inputs: Vec<T> = prefix.iter().map(|a| (*a).clone()).collect();
    inputs.push(best.clone());
    let total: u128 = prefix_sum + best.amount() as u128;

    Ok(Selection {
        inputs,
        total: u64::try_from(total).unwrap_or(u64::MAX),
        change_amount: u64::try_from(total - target as u128).unwrap_or(u64::MAX),
    })
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Coin {
        amount: u64,
        hash: Hash,
    }

    impl SelectableAccount for Coin {
        fn amount(&self) -> u64 {
            self.amount
        }

        fn hash(&self) -> &Hash {
            &self.hash
        }
    }

    fn coins(amounts: &[u64]) -> Vec<Coin> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Coin {
                amount: *amount,
                hash: [i as u8 + 1; 32],
            })
            .collect()
    }

    fn amounts(selection: &Selection<Coin>) -> Vec<u64> {
        selection.inputs.iter().map(|c| c.amount).collect()
    }

    #[test]
    fn prefers_single_covering_input() {
        let selection = select(&coins(&[5, 3, 2]), 4, 4).unwrap();
        assert_eq!(amounts(&selection), vec![5]);
        assert_eq!(selection.change_amount, 1);
    }

    #[test]
    fn best_fit_fills_the_last_slot() {
        let selection = select(&coins(&[5, 3, 2]), 6, 4).unwrap();
        assert_eq!(amounts(&selection), vec![5, 2]);
        assert_eq!(selection.change_amount, 1);

        let selection = select(&coins(&[10, 7, 4, 3]), 3, 4).unwrap();
        assert_eq!(amounts(&selection), vec![3]);
        assert_eq!(selection.change_amount, 0);
    }

    #[test]
    fn exact_total_consumes_everything() {
        let selection = select(&coins(&[5, 3, 2]), 10, 4).unwrap();
        assert_eq!(selection.inputs.len(), 3);
        assert_eq!(selection.change_amount, 0);
    }

    #[test]
    fn insufficient_funds_reports_available() {
        assert_eq!(
            select(&coins(&[5, 3, 2]), 11, 4),
            Err(SelectionError::InsufficientFunds {
                requested: 11,
                available: 10
            })
        );
        assert_eq!(
            select::<Coin>(&[], 1, 4),
            Err(SelectionError::InsufficientFunds {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn zero_target_is_rejected() {
        assert_eq!(select(&coins(&[1]), 0, 4), Err(SelectionError::InvalidTarget));
    }

    #[test]
    fn input_cap_is_enforced() {
        let result = select(&coins(&[1, 1, 1, 1, 1, 1]), 5, 4);
        assert_eq!(
            result,
            Err(SelectionError::TooManyInputs {
                requested: 5,
                required: 5,
                max: 4
            })
        );
    }

    #[test]
    fn zero_amount_accounts_are_ignored() {
        let selection = select(&coins(&[0, 0, 2]), 2, 1).unwrap();
        assert_eq!(amounts(&selection), vec![2]);
    }

    #[test]
    fn selection_is_deterministic_under_reordering() {
        let mut set = coins(&[4, 4, 4, 1]);
        let first = select(&set, 4, 4).unwrap();
        set.reverse();
        let second = select(&set, 4, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn randomized_sets_cover_target_minimally() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.gen_range(1..12);
            let set: Vec<u64> = (0..len).map(|_| rng.gen_range(0..1_000)).collect();
            let sum: u64 = set.iter().sum();
            if sum == 0 {
                continue;
            }
            let target = rng.gen_range(1..=sum);
            let selection = select(&coins(&set), target, usize::MAX).unwrap();

            let selected: u64 = amounts(&selection).iter().sum();
            assert!(selected >= target);
            assert_eq!(selection.total, selected);
            assert_eq!(selection.change_amount, selected - target);

            let mut sorted = set.clone();
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            let fewer: u64 = sorted.iter().take(selection.inputs.len() - 1).sum();
            assert!(fewer < target, "a smaller input set would have covered {target}");
        }
    }
}
