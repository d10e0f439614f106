//  Copyright 2025 Larder Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Assertion macros for internal invariants.
//!
//! With the `strict_assertions` cargo feature the checks run in release
//! builds as well; without it they compile to `debug_assert!`. Invariant
//! violations are programmer errors and abort, they are never surfaced as
//! recoverable errors.

/// Asserts in debug profile, or in all profiles with `strict_assertions`.
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {{
        #[cfg(feature = "strict_assertions")]
        {
            assert!($($arg)*);
        }
        #[cfg(not(feature = "strict_assertions"))]
        {
            debug_assert!($($arg)*);
        }
    }};
}

/// Equality variant of [`strict_assert!`].
#[macro_export]
macro_rules! strict_assert_eq {
    ($($arg:tt)*) => {{
        #[cfg(feature = "strict_assertions")]
        {
            assert_eq!($($arg)*);
        }
        #[cfg(not(feature = "strict_assertions"))]
        {
            debug_assert_eq!($($arg)*);
        }
    }};
}

/// Inequality variant of [`strict_assert!`].
#[macro_export]
macro_rules! strict_assert_ne {
    ($($arg:tt)*) => {{
        #[cfg(feature = "strict_assertions")]
        {
            assert_ne!($($arg)*);
        }
        #[cfg(not(feature = "strict_assertions"))]
        {
            debug_assert_ne!($($arg)*);
        }
    }};
}
