#![allow(dead_code)]

use nbhm::HashMap;

// Run the test on different configurations of a `HashMap`.
pub fn with_map<K, V>(mut test: impl FnMut(&dyn Fn() -> HashMap<K, V>)) {
    // The default configuration.
    test(&(|| HashMap::new()));

    // Copy a single slot at a time to stress operations on tables that are mid-resize.
    test(&(|| HashMap::builder().copy_chunk(1).build()));

    // A short reprobe window, forcing frequent resizes through exhausted probes.
    test(&(|| HashMap::builder().reprobe_limit(1).copy_chunk(4).build()));

    // A low load factor with aggressive growth, forcing resizes through overloaded tables.
    if !cfg!(nbhm_stress) {
        test(
            &(|| {
                HashMap::builder()
                    .load_factor(0.25)
                    .growth_factor(4)
                    .copy_chunk(128)
                    .build()
            }),
        );
    }
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
