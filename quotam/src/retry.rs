use crate::client::ClientError;

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/*
 * Backoff used when a write hits an optimistic-concurrency conflict.
 *
 * `steps` is the total number of attempts, the n-th retry waits
 * `duration * factor^n` plus up to `jitter` of that on top.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub steps: u32,
    pub duration: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
	Self{
	    steps: 5,
	    duration: Duration::from_millis(10),
	    factor: 2.0,
	    jitter: 0.1,
	}
    }
}

impl RetryPolicy {

    pub fn delay(&self, retry: u32) -> Duration {
	self.duration.mul_f64(self.factor.powi(retry as i32))
    }

    fn jittered(&self, delay: Duration) -> Duration {
	if self.jitter <= 0.0 {
	    return delay;
	}
	delay + delay.mul_f64(rand::thread_rng().gen_range(0.0..self.jitter))
    }
}

/*
 * Runs `op` until it returns anything but a conflict, giving up after
 * `policy.steps` attempts. On give up the last conflict is returned.
 */
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut retry = 0;

    loop {
	match op().await {
	    Err(err) if err.is_conflict() && retry + 1 < policy.steps => {
		let delay = policy.jittered(policy.delay(retry));
		log::debug!("conflict on attempt {}, retrying in {:?}: {}", retry + 1, delay, err);

		tokio::time::sleep(delay).await;
		retry += 1;
	    },
	    result => return result,
	}
    }
}
