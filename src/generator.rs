// src/generator.rs

use crate::constants::*;
use crate::models::{Fact, Operator, Stage, Subskill, SubskillProgress};
use crate::selector::select_target;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

// --- Unconstrained Generators ---

pub fn random_addition<R: Rng + ?Sized>(rng: &mut R) -> Fact {
    Fact::addition(
        rng.gen_range(0..=ADDITION_RANDOM_MAX),
        rng.gen_range(0..=ADDITION_RANDOM_MAX),
    )
}

pub fn random_multiplication<R: Rng + ?Sized>(rng: &mut R) -> Fact {
    Fact::multiplication(
        rng.gen_range(0..=MULT_RANDOM_MAX),
        rng.gen_range(0..=MULT_RANDOM_MAX),
    )
}

/// Stage 1: single digits, ordered. Stage 2: 3-digit pairs, or 10..=109 pairs 30% of the time.
pub fn subtraction_fact<R: Rng + ?Sized>(stage: Stage, rng: &mut R) -> Fact {
    match stage {
        Stage::Foundational => Fact::subtraction(rng.gen_range(0..=9), rng.gen_range(0..=9)),
        Stage::Open if rng.gen_bool(0.3) => {
            Fact::subtraction(rng.gen_range(10..=109), rng.gen_range(10..=109))
        }
        Stage::Open => Fact::subtraction(rng.gen_range(100..=999), rng.gen_range(100..=999)),
    }
}

/// Exact divisions. Stage 1: divisor and quotient 2..=9. Stage 2: divisor 2..=10, quotient 10..=99.
pub fn division_fact<R: Rng + ?Sized>(stage: Stage, rng: &mut R) -> Fact {
    match stage {
        Stage::Foundational => Fact::division(rng.gen_range(2..=9), rng.gen_range(2..=9)),
        Stage::Open => Fact::division(rng.gen_range(2..=10), rng.gen_range(10..=99)),
    }
}

/// Unconstrained fact for an operator at its open stage.
pub fn random_fact<R: Rng + ?Sized>(operator: Operator, rng: &mut R) -> Fact {
    match operator {
        Operator::Addition => random_addition(rng),
        Operator::Multiplication => random_multiplication(rng),
        Operator::Subtraction => subtraction_fact(Stage::Open, rng),
        Operator::Division => division_fact(Stage::Open, rng),
    }
}

// --- Stage-One Generators ---

pub fn single_digit_addition<R: Rng + ?Sized>(rng: &mut R) -> Fact {
    Fact::addition(rng.gen_range(0..=9), rng.gen_range(0..=9))
}

/// `table x 2..=9` in random operand order.
pub fn table_fact<R: Rng + ?Sized>(table: u32, rng: &mut R) -> Fact {
    let other = rng.gen_range(2..=9);
    if rng.gen_bool(0.5) {
        Fact::multiplication(table, other)
    } else {
        Fact::multiplication(other, table)
    }
}

// --- Targeted Generators ---

/// Synthesizes an addition fact exercising `subskill`. Non-addition subskills fall back
/// to [`random_addition`].
pub fn targeted_addition<R: Rng + ?Sized>(subskill: Subskill, rng: &mut R) -> Fact {
    let (num1, num2) = match subskill {
        Subskill::FactsZeroToNine => (rng.gen_range(0..=9), rng.gen_range(0..=9)),
        Subskill::CarryTrigger => draw_until(
            rng,
            |r| (r.gen_range(10..=99), r.gen_range(10..=99)),
            |a, b| a % 10 + b % 10 >= 10,
        ),
        Subskill::CarryPropagation => {
            let ones = pick_pair(&CARRY_CHAIN_ONES, rng);
            let tens = pick_pair(&CARRY_CHAIN_TENS, rng);
            (tens.0 * 10 + ones.0, tens.1 * 10 + ones.1)
        }
        Subskill::FinalCarry => (rng.gen_range(5..=9) * 100, rng.gen_range(5..=9) * 100),
        Subskill::PlaceAlignment => {
            swap_maybe((rng.gen_range(1..=9), rng.gen_range(100..=999)), rng)
        }
        Subskill::ZeroIdentity => {
            swap_maybe((rng.gen_range(1..=9) * 10, rng.gen_range(1..=9)), rng)
        }
        Subskill::MultiDigitFlow => (rng.gen_range(100..=999), rng.gen_range(100..=999)),
        other => {
            debug!("[Generator] {} is not an addition subskill, using random", other);
            return random_addition(rng);
        }
    };
    Fact::addition(num1, num2).with_target(subskill)
}

/// Synthesizes a multiplication fact exercising `subskill`. Non-multiplication subskills
/// fall back to [`random_multiplication`].
pub fn targeted_multiplication<R: Rng + ?Sized>(subskill: Subskill, rng: &mut R) -> Fact {
    let (a, b) = match subskill {
        Subskill::FactsZeroToTen => (rng.gen_range(0..=10), rng.gen_range(0..=10)),
        Subskill::FactsElevenTwelve => (rng.gen_range(11..=12), rng.gen_range(2..=12)),
        Subskill::ZeroOneLaws => swap_maybe((rng.gen_range(0..=1), rng.gen_range(2..=12)), rng),
        Subskill::SquareNumbers => {
            let a = rng.gen_range(2..=12);
            (a, a)
        }
        Subskill::CommutativityRecognition => {
            let a = rng.gen_range(2..=12);
            let mut b = rng.gen_range(2..=12);
            if a == b {
                b = (a + rng.gen_range(1..=10)) % 12 + 1;
            }
            (a, b)
        }
        Subskill::DistributionAnchor => {
            swap_maybe((rng.gen_range(2..=9), 10 + rng.gen_range(1..=2)), rng)
        }
        Subskill::MultiDigitFlowMult => (rng.gen_range(10..=25), rng.gen_range(10..=25)),
        other => {
            debug!("[Generator] {} is not a multiplication subskill, using random", other);
            return random_multiplication(rng);
        }
    };
    Fact::multiplication(a, b).with_target(subskill)
}

pub fn targeted<R: Rng + ?Sized>(operator: Operator, subskill: Subskill, rng: &mut R) -> Fact {
    match operator {
        Operator::Addition => targeted_addition(subskill, rng),
        Operator::Multiplication => targeted_multiplication(subskill, rng),
        other => random_fact(other, rng),
    }
}

/// Targeted generation from a persisted subskill id; unmapped ids fall back to random.
pub fn targeted_by_id<R: Rng + ?Sized>(operator: Operator, id: &str, rng: &mut R) -> Fact {
    match id.parse::<Subskill>() {
        Ok(subskill) => targeted(operator, subskill, rng),
        Err(_) => {
            debug!("[Generator] Unmapped subskill id '{}', using random", id);
            random_fact(operator, rng)
        }
    }
}

/// Open-stage question: target the neediest subskill when adaptive, otherwise random.
pub fn next_adaptive<R: Rng + ?Sized>(
    operator: Operator,
    progress: &SubskillProgress,
    adaptive: bool,
    rng: &mut R,
) -> Fact {
    if !adaptive {
        return random_fact(operator, rng);
    }
    let targets = match operator {
        Operator::Addition => ADDITION_SUBSKILL_TARGETS,
        Operator::Multiplication => MULT_SUBSKILL_TARGETS,
        other => return random_fact(other, rng),
    };
    match select_target(progress, targets) {
        Some(subskill) => targeted(operator, subskill, rng),
        None => random_fact(operator, rng),
    }
}

// --- Helpers ---

/// Rejection sampling capped at `GENERATOR_MAX_RETRIES`; the last draw wins on exhaustion.
fn draw_until<R, D, A>(rng: &mut R, mut draw: D, accept: A) -> (u32, u32)
where
    R: Rng + ?Sized,
    D: FnMut(&mut R) -> (u32, u32),
    A: Fn(u32, u32) -> bool,
{
    let mut pair = draw(rng);
    for _ in 0..GENERATOR_MAX_RETRIES {
        if accept(pair.0, pair.1) {
            return pair;
        }
        pair = draw(rng);
    }
    warn!(
        "[Generator] No accepted draw after {} retries, keeping {:?}",
        GENERATOR_MAX_RETRIES, pair
    );
    pair
}

fn swap_maybe<R: Rng + ?Sized>(pair: (u32, u32), rng: &mut R) -> (u32, u32) {
    if rng.gen_bool(0.5) {
        (pair.1, pair.0)
    } else {
        pair
    }
}

fn pick_pair<R: Rng + ?Sized>(pairs: &[(u32, u32)], rng: &mut R) -> (u32, u32) {
    pairs.choose(rng).copied().unwrap_or((9, 9))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::models::Tally;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_targeted_facts_exercise_their_subskill() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let checked = Subskill::ADDITION
            .iter()
            .chain(Subskill::MULTIPLICATION.iter())
            .filter(|s| **s != Subskill::MultiDigitFlowMult);
        for &subskill in checked {
            for _ in 0..200 {
                let fact = targeted(subskill.operator(), subskill, &mut rng);
                assert_eq!(fact.target(), Some(subskill));
                assert!(
                    classify(&fact).contains(&subskill),
                    "{} generated for {}",
                    fact,
                    subskill
                );
            }
        }
    }

    #[test]
    fn test_multi_digit_mult_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let fact = targeted_multiplication(Subskill::MultiDigitFlowMult, &mut rng);
            assert!((10..=25).contains(&fact.left()));
            assert!((10..=25).contains(&fact.right()));
        }
    }

    #[test]
    fn test_foreign_subskill_falls_back_to_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let fact = targeted_addition(Subskill::SquareNumbers, &mut rng);
        assert_eq!(fact.operator(), Operator::Addition);
        assert_eq!(fact.target(), None);

        let fact = targeted_by_id(Operator::Multiplication, "long-division", &mut rng);
        assert_eq!(fact.operator(), Operator::Multiplication);
        assert!(fact.left() <= MULT_RANDOM_MAX && fact.right() <= MULT_RANDOM_MAX);
    }

    #[test]
    fn test_subtraction_never_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for stage in [Stage::Foundational, Stage::Open] {
            for _ in 0..300 {
                let fact = subtraction_fact(stage, &mut rng);
                assert!(fact.left() >= fact.right());
            }
        }
    }

    #[test]
    fn test_division_is_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for stage in [Stage::Foundational, Stage::Open] {
            for _ in 0..300 {
                let fact = division_fact(stage, &mut rng);
                assert_eq!(fact.left() % fact.right(), 0);
                assert_eq!(fact.answer() * fact.right(), fact.left());
            }
        }
    }

    #[test]
    fn test_table_fact_contains_table() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let fact = table_fact(6, &mut rng);
            assert!(fact.left() == 6 || fact.right() == 6);
        }
    }

    #[test]
    fn test_next_adaptive_targets_when_enabled() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let fact = next_adaptive(Operator::Addition, &SubskillProgress::new(), true, &mut rng);
        assert_eq!(fact.target(), Some(Subskill::MultiDigitFlow));

        let fact = next_adaptive(Operator::Addition, &SubskillProgress::new(), false, &mut rng);
        assert_eq!(fact.target(), None);

        let mastered: SubskillProgress = ADDITION_SUBSKILL_TARGETS
            .iter()
            .map(|&(id, t)| (id, Tally::new(t, t)))
            .collect();
        let fact = next_adaptive(Operator::Addition, &mastered, true, &mut rng);
        assert_eq!(fact.target(), None);
    }

    #[test]
    fn test_draw_until_caps_retries() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let pair = draw_until(&mut rng, |_| (1, 1), |_, _| false);
        assert_eq!(pair, (1, 1));
    }
}
