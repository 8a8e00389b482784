mod helpers;
mod iter_tests;
mod merge_tests;
