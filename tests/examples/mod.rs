mod mismatch_tests;
mod prefix_tests;
mod response_tests;
