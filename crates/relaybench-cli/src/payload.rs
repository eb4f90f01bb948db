//! Calldata for the load-test contract.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolCall;

use relaybench_ops::Job;

alloy_sol_types::sol! {
    interface PerformanceTest {
        function test(uint256 iterations) external;
    }
}

/// Job mix sent by a default run: mostly cheap calls with a few heavy ones.
pub const DEFAULT_JOBS: [u64; 32] = [
    3001, 3002, 3003, 3004, 3005, 3006, 103, 1, 3007, 3008, 201, 3, 2, 301, 400, 605, 100, 4, 5,
    6, 4009, 10, 20, 41, 4000, 80, 30, 40, 202, 800, 900, 401,
];

/// Encode `test(iterations)`.
pub fn encode_test_call(iterations: u64) -> Bytes {
    let call = PerformanceTest::testCall { iterations: U256::from(iterations) };
    Bytes::from(call.abi_encode())
}

/// One job per iteration count; the count is also the declared cost.
pub fn build_jobs(iterations: &[u64]) -> Vec<Job> {
    iterations
        .iter()
        .map(|n| Job::new(*n, encode_test_call(*n)))
        .collect()
}
