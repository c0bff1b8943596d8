#[macro_export]
macro_rules! traits {
    ($($b:expr),* $(,)?) => {{
        use $crate::species::Traits;
        Traits::from_bits(&[$($b != 0),*])
    }};
}

#[macro_export]
macro_rules! species {
    ($name:expr, [$($b:expr),* $(,)?]) => {{
        use $crate::species::Species;
        Species::from_traits($name, $crate::traits![$($b),*])
    }};
}
