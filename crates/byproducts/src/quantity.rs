/// Physical by-product mass for a batch.
///
/// `byproduct_percent` is a percentage of the input mass. With no input mass
/// (zero) the percentage figure itself is stored as the quantity; existing
/// records depend on that fallback.
pub fn derive_quantity_kg(byproduct_percent: f64, bauxite_mass: f64) -> f64 {
    if bauxite_mass > 0.0 {
        (byproduct_percent / 100.0) * bauxite_mass
    } else {
        byproduct_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scales_percentage_by_mass() {
        assert!((derive_quantity_kg(21.44, 200.0) - 42.88).abs() < 1e-9);
        assert_eq!(derive_quantity_kg(50.0, 10.0), 5.0);
    }

    #[test]
    fn zero_mass_falls_back_to_percentage() {
        assert_eq!(derive_quantity_kg(21.44, 0.0), 21.44);
    }

    proptest! {
        #[test]
        fn positive_mass_is_exact_product(
            pct in 0.0f64..100.0,
            mass in 0.001f64..1.0e6,
        ) {
            prop_assert_eq!(derive_quantity_kg(pct, mass), (pct / 100.0) * mass);
        }

        #[test]
        fn zero_mass_is_identity(pct in 0.0f64..100.0) {
            prop_assert_eq!(derive_quantity_kg(pct, 0.0), pct);
        }
    }
}
