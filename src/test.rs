// tests that Clone, Debug, and PartialEq are implemented for a type
#[macro_export]
macro_rules! test_basic_impls {
    ($fx: expr) => {
        #[test]
        fn should_impl_debug_clone_and_partialeq() {
            let fx = $fx;
            assert_eq!(fx, fx.clone());
            let _s1 = format!("{:?}", fx);
        }
    };
}
