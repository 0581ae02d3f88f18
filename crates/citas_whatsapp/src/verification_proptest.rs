#[cfg(test)]
mod tests {
    use crate::phone::format_phone;
    use crate::verification::{code_from_rng, CODE_MAX, CODE_MIN};
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    proptest! {
        #[test]
        fn test_codes_are_six_digits_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..32 {
                let code = code_from_rng(&mut rng);
                prop_assert_eq!(code.len(), 6);
                prop_assert!(code.chars().all(|c| c.is_ascii_digit()));
                let value: u32 = code.parse().unwrap();
                prop_assert!((CODE_MIN..=CODE_MAX).contains(&value));
            }
        }

        #[test]
        fn test_formatted_phone_is_digits_only(phone in "[+0-9 ()-]{0,20}") {
            let formatted = format_phone(&phone);
            prop_assert!(formatted.chars().all(|c| c.is_ascii_digit()));
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            prop_assert!(formatted.ends_with(&digits));
        }

        #[test]
        fn test_formatting_is_idempotent(phone in "[+0-9 ]{0,16}") {
            let once = format_phone(&phone);
            prop_assert_eq!(format_phone(&once), once.clone());
        }
    }
}
