//! Property-based tests for path manipulation functions.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{join_dir, parent_dir, resolve_relative, split_segments, strip_leading_slash};
    use proptest::prelude::*;

    proptest! {
        /// Property: split_segments never yields empty components
        #[test]
        fn split_segments_has_no_empty_components(input in "[a-z/]{0,40}") {
            for segment in split_segments(&input) {
                prop_assert!(!segment.is_empty());
                prop_assert!(!segment.contains('/'));
            }
        }

        /// Property: joining the segments of a clean path gives the path back
        #[test]
        fn split_segments_round_trips_clean_paths(parts in prop::collection::vec("[a-z0-9._-]{1,8}", 1..6)) {
            let path = format!("/{}", parts.join("/"));
            prop_assert_eq!(split_segments(&path), parts);
        }

        /// Property: the parent of dir/name is dir without its leading slash
        #[test]
        fn parent_dir_of_joined_path(dir in "[a-z]{1,6}(/[a-z]{1,6}){0,3}", name in "[a-z]{1,8}\\.cwl") {
            let joined = join_dir(&format!("/{}", dir), &name);
            prop_assert_eq!(parent_dir(&joined), dir);
        }

        /// Property: parent_dir never starts with a separator
        #[test]
        fn parent_dir_has_no_leading_slash(input in "/?[a-z/]{0,30}") {
            prop_assert!(!parent_dir(&input).starts_with('/'));
        }

        /// Property: absolute paths ignore the working directory
        #[test]
        fn resolve_relative_keeps_absolute(wd in "[a-z/]{0,12}", rest in "[a-z/]{0,20}") {
            let absolute = format!("/{}", rest);
            prop_assert_eq!(resolve_relative(&wd, &absolute), absolute);
        }

        /// Property: relative resolution ends with the requested path
        #[test]
        fn resolve_relative_ends_with_path(wd in "[a-z]{0,8}", rest in "[a-z]{1,8}") {
            prop_assert!(resolve_relative(&wd, &rest).ends_with(&rest));
        }

        /// Property: strip_leading_slash is idempotent
        #[test]
        fn strip_leading_slash_idempotent(input in "/{0,3}[a-z/]{0,12}") {
            let once = strip_leading_slash(&input);
            prop_assert_eq!(strip_leading_slash(once), once);
        }
    }
}
