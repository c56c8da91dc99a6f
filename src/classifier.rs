// src/classifier.rs

use crate::models::{digit_count, Fact, Operator, Subskill};
use log::debug;

// --- Public Interface ---

/// Tags a fact with the subskills it exercises. Subtraction and division carry no tags.
pub fn classify(fact: &Fact) -> Vec<Subskill> {
    let tags = match fact.operator() {
        Operator::Addition => classify_addition(fact.left(), fact.right()),
        Operator::Multiplication => classify_multiplication(fact.left(), fact.right()),
        Operator::Subtraction | Operator::Division => Vec::new(),
    };
    debug!("[Classify] {} -> {:?}", fact, tags);
    tags
}

/// Addition rules, each evaluated independently, returned in rule order.
pub fn classify_addition(num1: u32, num2: u32) -> Vec<Subskill> {
    let mut tags = Vec::new();
    let digits_a = digit_count(num1);
    let digits_b = digit_count(num2);
    let max_len = digits_a.max(digits_b);

    if digits_a == 1 && digits_b == 1 {
        tags.push(Subskill::FactsZeroToNine);
    }
    if num1 % 10 + num2 % 10 >= 10 {
        tags.push(Subskill::CarryTrigger);
    }
    if requires_carry_propagation(num1, num2, max_len) {
        tags.push(Subskill::CarryPropagation);
    }
    if digit_count(num1.saturating_add(num2)) > max_len {
        tags.push(Subskill::FinalCarry);
    }
    if digits_a != digits_b {
        tags.push(Subskill::PlaceAlignment);
    }
    if num1 == 0 || num2 == 0 || num1 % 10 == 0 || num2 % 10 == 0 {
        tags.push(Subskill::ZeroIdentity);
    }
    if max_len >= 2 {
        tags.push(Subskill::MultiDigitFlow);
    }

    tags
}

/// Multiplication rules over `x = max(a, b)`, `y = min(a, b)`.
pub fn classify_multiplication(a: u32, b: u32) -> Vec<Subskill> {
    let mut tags = Vec::new();
    let x = a.max(b);
    let y = a.min(b);

    if x <= 10 {
        tags.push(Subskill::FactsZeroToTen);
    } else if x <= 12 {
        tags.push(Subskill::FactsElevenTwelve);
    }
    if a <= 1 || b <= 1 {
        tags.push(Subskill::ZeroOneLaws);
    }
    if a == b && a <= 12 {
        tags.push(Subskill::SquareNumbers);
    }
    if a != b && x <= 12 {
        tags.push(Subskill::CommutativityRecognition);
    }
    if x > 10 && y <= 10 {
        tags.push(Subskill::DistributionAnchor);
    }
    if x > 12 {
        tags.push(Subskill::MultiDigitFlowMult);
    }

    tags
}

// --- Internal Logic ---

/// A carry has to be received and passed on by at least one column above the ones,
/// and the final column has to carry out into a new leading digit.
fn requires_carry_propagation(num1: u32, num2: u32, max_len: usize) -> bool {
    if max_len < 2 {
        return false;
    }
    let mut carry = 0;
    let mut chain = 0;
    let (mut a, mut b) = (num1, num2);
    for column in 0..max_len {
        let sum = a % 10 + b % 10 + carry;
        let carry_out = u32::from(sum >= 10);
        if column > 0 && carry == 1 && carry_out == 1 {
            chain += 1;
        }
        carry = carry_out;
        a /= 10;
        b /= 10;
    }
    chain >= 1 && carry == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_digit_facts() {
        let tags = classify_addition(7, 5);
        assert!(tags.contains(&Subskill::FactsZeroToNine));
        assert!(tags.contains(&Subskill::CarryTrigger));
        assert!(tags.contains(&Subskill::FinalCarry));
        assert!(!tags.contains(&Subskill::MultiDigitFlow));

        let tags = classify_addition(3, 4);
        assert_eq!(tags, vec![Subskill::FactsZeroToNine]);
    }

    #[test]
    fn test_carry_propagation_requires_full_chain() {
        // 95 + 8: ones carry into tens, tens carry out into hundreds
        assert!(classify_addition(95, 8).contains(&Subskill::CarryPropagation));
        assert!(classify_addition(87, 58).contains(&Subskill::CarryPropagation));
        // 50 + 60: tens carries out but never received a carry
        assert!(!classify_addition(50, 60).contains(&Subskill::CarryPropagation));
        // 47 + 38: the ones carry dies in the tens column
        assert!(!classify_addition(47, 38).contains(&Subskill::CarryPropagation));
        // 195 + 5: chain through tens, dies in hundreds
        assert!(!classify_addition(195, 5).contains(&Subskill::CarryPropagation));
    }

    #[test]
    fn test_alignment_zero_and_flow() {
        let tags = classify_addition(7, 123);
        assert!(tags.contains(&Subskill::PlaceAlignment));
        assert!(tags.contains(&Subskill::MultiDigitFlow));
        assert!(!tags.contains(&Subskill::FinalCarry));

        let tags = classify_addition(30, 7);
        assert!(tags.contains(&Subskill::ZeroIdentity));
        assert!(classify_addition(0, 4).contains(&Subskill::ZeroIdentity));
    }

    #[test]
    fn test_multiplication_tags() {
        let tags = classify_multiplication(7, 7);
        assert!(tags.contains(&Subskill::FactsZeroToTen));
        assert!(tags.contains(&Subskill::SquareNumbers));
        assert!(!tags.contains(&Subskill::CommutativityRecognition));

        let tags = classify_multiplication(9, 6);
        assert!(tags.contains(&Subskill::FactsZeroToTen));
        assert!(tags.contains(&Subskill::CommutativityRecognition));
        assert!(!tags.contains(&Subskill::DistributionAnchor));

        let tags = classify_multiplication(12, 4);
        assert!(tags.contains(&Subskill::FactsElevenTwelve));
        assert!(tags.contains(&Subskill::DistributionAnchor));

        let tags = classify_multiplication(1, 15);
        assert!(tags.contains(&Subskill::ZeroOneLaws));
        assert!(tags.contains(&Subskill::MultiDigitFlowMult));
        assert!(tags.contains(&Subskill::DistributionAnchor));
        assert!(!tags.contains(&Subskill::FactsElevenTwelve));
    }

    #[test]
    fn test_subtraction_has_no_tags() {
        assert!(classify(&Fact::subtraction(9, 4)).is_empty());
        assert!(classify(&Fact::division(3, 4)).is_empty());
    }
}
