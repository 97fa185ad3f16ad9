//! Redis-backed storage: every mutation that touches more than one key
//! (reading `n`/`mean-reward`/`max-reward`, computing the update, writing it
//! back) runs as a single server-side Lua script (`redis::Script`), never a
//! client-side read-modify-write.
//!
//! Key layout:
//! `bandit:experiment:{name}:{params|arm-names|arm-states:{arm}|max-reward|choose-count}`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::{error, warn};

use super::StorageBackend;
use crate::error::{BanditError, BanditResult};
use crate::key;
use crate::model::{Algorithm, ArmState, Parameters, DEFAULT_MAX_REWARD};
use crate::reward_math::BulkRewardInput;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub max_connections: usize,
    pub command_timeout: Duration,
    pub max_retries: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
            command_timeout: Duration::from_secs(2),
            max_retries: 2,
        }
    }
}

pub struct RemoteBackend {
    pool: Pool,
    config: RemoteConfig,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> BanditResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| BanditError::Storage(format!("pool builder: {e}")))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| BanditError::Storage(format!("pool build: {e}")))?;
        Ok(Self { pool, config })
    }

    async fn conn(&self) -> BanditResult<deadpool_redis::Connection> {
        tokio::time::timeout(self.config.command_timeout, self.pool.get())
            .await
            .map_err(|_| BanditError::Storage("connection pool timed out".into()))?
            .map_err(|e| {
                error!(error = %e, "failed to acquire redis connection");
                BanditError::Storage(format!("pool get: {e}"))
            })
    }

    fn algo_fields(algo: &Algorithm) -> Vec<(&'static str, String)> {
        match algo {
            Algorithm::EpsilonGreedy { epsilon } => vec![
                ("algo", "epsilon_greedy".to_string()),
                ("epsilon", epsilon.to_string()),
            ],
            Algorithm::Ucb1 { exploration_mult } => vec![
                ("algo", "ucb1".to_string()),
                ("exploration_mult", exploration_mult.to_string()),
            ],
            Algorithm::Softmax {
                starting_temperature,
                temp_decay_per_step,
                min_temperature,
            } => vec![
                ("algo", "softmax".to_string()),
                ("starting_temperature", starting_temperature.to_string()),
                ("temp_decay_per_step", temp_decay_per_step.to_string()),
                ("min_temperature", min_temperature.to_string()),
            ],
            Algorithm::Random => vec![("algo", "random".to_string())],
        }
    }

    fn parse_params(fields: BTreeMap<String, String>) -> BanditResult<Parameters> {
        let parse = |k: &str| -> BanditResult<f64> {
            fields
                .get(k)
                .ok_or_else(|| BanditError::Storage(format!("missing field {k}")))?
                .parse()
                .map_err(|_| BanditError::Storage(format!("unparseable field {k}")))
        };
        let algo = match fields.get("algo").map(String::as_str) {
            Some("epsilon_greedy") => Algorithm::EpsilonGreedy { epsilon: parse("epsilon")? },
            Some("ucb1") => Algorithm::Ucb1 { exploration_mult: parse("exploration_mult")? },
            Some("softmax") => Algorithm::Softmax {
                starting_temperature: parse("starting_temperature")?,
                temp_decay_per_step: parse("temp_decay_per_step")?,
                min_temperature: parse("min_temperature")?,
            },
            Some("random") => Algorithm::Random,
            other => {
                return Err(BanditError::Storage(format!(
                    "unknown or missing algo field: {other:?}"
                )))
            }
        };
        Ok(Parameters {
            algorithm: algo,
            maximize: fields.get("maximize").map(|v| v == "true").unwrap_or(true),
            reward_lower_bound: parse("reward_lower_bound").unwrap_or(0.0),
        })
    }
}

/// `KEYS = [params, arm-names, max-reward, choose-count, arm-state-key...]`
/// `ARGV = [maximize, reward_lower_bound, default_max_reward, num_algo_fields,
///          (field, value)*, arm-name...]` — one arm name per trailing KEY,
/// in the same order.
const INIT_EXPERIMENT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
local idx = 1
local maximize = ARGV[idx]; idx = idx + 1
local lower_bound = ARGV[idx]; idx = idx + 1
local default_max = ARGV[idx]; idx = idx + 1
local num_fields = tonumber(ARGV[idx]); idx = idx + 1
local hset_args = {KEYS[1], 'maximize', maximize, 'reward_lower_bound', lower_bound}
for i = 1, num_fields do
  table.insert(hset_args, ARGV[idx]); idx = idx + 1
  table.insert(hset_args, ARGV[idx]); idx = idx + 1
end
redis.call('HSET', unpack(hset_args))
local num_arms = #KEYS - 4
for i = 1, num_arms do
  local arm = ARGV[idx]; idx = idx + 1
  local arm_key = KEYS[4 + i]
  redis.call('SADD', KEYS[2], arm)
  redis.call('HSET', arm_key, 'n', '1', 'mean-reward', '0', 'deleted', 'false')
end
redis.call('SET', KEYS[3], default_max)
redis.call('SET', KEYS[4], '0')
return 1
"#;

const RECORD_REWARD_SCRIPT: &str = r#"
local arm_key = KEYS[1]
local max_key = KEYS[2]
if redis.call('EXISTS', arm_key) == 0 then
  return 0
end
local lower_bound = tonumber(ARGV[1])
local reward = tonumber(ARGV[2])
local n = tonumber(redis.call('HGET', arm_key, 'n'))
local mean = tonumber(redis.call('HGET', arm_key, 'mean-reward'))
local max_reward = tonumber(redis.call('GET', max_key))

local clamped = math.max(reward, lower_bound)
local new_max = math.max(max_reward, clamped)
local s
if new_max == lower_bound then
  s = lower_bound
else
  s = (clamped - lower_bound) / (new_max - lower_bound)
end
local delta = s - mean
local new_n = n + 1
local new_mean = mean + delta / new_n

redis.call('HSET', arm_key, 'n', new_n, 'mean-reward', new_mean)
redis.call('SET', max_key, new_max)
return 1
"#;

const BULK_REWARD_SCRIPT: &str = r#"
local arm_key = KEYS[1]
local max_key = KEYS[2]
if redis.call('EXISTS', arm_key) == 0 then
  return 0
end
local lower_bound = tonumber(ARGV[1])
local batch_mean = tonumber(ARGV[2])
local batch_max = tonumber(ARGV[3])
local count = tonumber(ARGV[4])
local n = tonumber(redis.call('HGET', arm_key, 'n'))
local mean = tonumber(redis.call('HGET', arm_key, 'mean-reward'))
local max_reward = tonumber(redis.call('GET', max_key))

local clamped_mean = math.max(batch_mean, lower_bound)
local clamped_max = math.max(batch_max, lower_bound)
local new_max = math.max(max_reward, clamped_max)
local s
if new_max == lower_bound then
  s = lower_bound
else
  s = (clamped_mean - lower_bound) / (new_max - lower_bound)
end
local delta = s - mean
local new_n = n + count
local new_mean = mean + delta * (count / new_n)

redis.call('HSET', arm_key, 'n', new_n, 'mean-reward', new_mean)
redis.call('SET', max_key, new_max)
return 1
"#;

const CREATE_ARM_SCRIPT: &str = r#"
local names_key = KEYS[1]
local arm_key = KEYS[2]
local arm = ARGV[1]
redis.call('SADD', names_key, arm)
if redis.call('EXISTS', arm_key) == 1 then
  redis.call('HSET', arm_key, 'deleted', 'false')
else
  redis.call('HSET', arm_key, 'n', '1', 'mean-reward', '0', 'deleted', 'false')
end
return 1
"#;

fn arm_state_from_hash(fields: &BTreeMap<String, String>) -> Option<ArmState> {
    Some(ArmState {
        n: fields.get("n")?.parse().ok()?,
        mean_reward: fields.get("mean-reward")?.parse().ok()?,
        deleted: fields.get("deleted").map(|v| v == "true").unwrap_or(false),
    })
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    async fn exists_experiment(&self, experiment: &str) -> BanditResult<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = conn
            .exists(key::params_key(experiment))
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(exists)
    }

    async fn init_experiment(
        &self,
        experiment: &str,
        params: &Parameters,
        arm_names: &[String],
    ) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let algo_fields = Self::algo_fields(&params.algorithm);

        let mut argv: Vec<String> = vec![
            params.maximize.to_string(),
            params.reward_lower_bound.to_string(),
            DEFAULT_MAX_REWARD.to_string(),
            algo_fields.len().to_string(),
        ];
        for (k, v) in &algo_fields {
            argv.push(k.to_string());
            argv.push(v.clone());
        }
        argv.extend(arm_names.iter().cloned());

        let script = Script::new(INIT_EXPERIMENT_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(key::params_key(experiment))
            .key(key::arm_names_key(experiment))
            .key(key::max_reward_key(experiment))
            .key(key::choose_count_key(experiment));
        for name in arm_names {
            invocation.key(key::arm_state_key(experiment, name));
        }
        invocation.arg(argv);
        invocation
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_params(&self, experiment: &str) -> BanditResult<Option<Parameters>> {
        let mut conn = self.conn().await?;
        let fields: BTreeMap<String, String> = conn
            .hgetall(key::params_key(experiment))
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::parse_params(fields)?))
    }

    async fn get_arm_states(&self, experiment: &str) -> BanditResult<BTreeMap<String, ArmState>> {
        let mut conn = self.conn().await?;
        let names: BTreeSet<String> = conn
            .smembers(key::arm_names_key(experiment))
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;

        let mut result = BTreeMap::new();
        for name in names {
            let fields: BTreeMap<String, String> = conn
                .hgetall(key::arm_state_key(experiment, &name))
                .await
                .map_err(|e| BanditError::Storage(e.to_string()))?;
            if let Some(state) = arm_state_from_hash(&fields) {
                if !state.deleted {
                    result.insert(name, state);
                }
            }
        }
        Ok(result)
    }

    async fn get_arm_names(&self, experiment: &str) -> BanditResult<BTreeSet<String>> {
        Ok(self.get_arm_states(experiment).await?.into_keys().collect())
    }

    async fn create_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let script = Script::new(CREATE_ARM_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(key::arm_names_key(experiment))
            .key(key::arm_state_key(experiment, arm))
            .arg(arm);
        invocation
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn soft_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let arm_key = key::arm_state_key(experiment, arm);
        let exists: bool = conn
            .exists(&arm_key)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        if exists {
            let _: () = conn
                .hset(&arm_key, "deleted", "true")
                .await
                .map_err(|e| BanditError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn hard_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .del(key::arm_state_key(experiment, arm))
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        let _: () = conn
            .srem(key::arm_names_key(experiment), arm)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        reward: f64,
    ) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let script = Script::new(RECORD_REWARD_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(key::arm_state_key(experiment, arm))
            .key(key::max_reward_key(experiment))
            .arg(lower_bound)
            .arg(reward);
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        if result == 0 {
            warn!(experiment, arm, "reward ignored: arm absent or hard-deleted");
        }
        Ok(())
    }

    async fn bulk_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        batch: BulkRewardInput,
    ) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let script = Script::new(BULK_REWARD_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(key::arm_state_key(experiment, arm))
            .key(key::max_reward_key(experiment))
            .arg(lower_bound)
            .arg(batch.mean)
            .arg(batch.max)
            .arg(batch.count);
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        if result == 0 {
            warn!(experiment, arm, "bulk reward ignored: arm absent or hard-deleted");
        }
        Ok(())
    }

    async fn incr_choose_count(&self, experiment: &str) -> BanditResult<u64> {
        let mut conn = self.conn().await?;
        let new_count: u64 = conn
            .incr(key::choose_count_key(experiment), 1)
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(new_count)
    }

    async fn get_choose_count(&self, experiment: &str) -> BanditResult<u64> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn
            .get(key::choose_count_key(experiment))
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        Ok(count.unwrap_or(0))
    }

    async fn reset(&self) -> BanditResult<()> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn
            .keys(key::global_pattern())
            .await
            .map_err(|e| BanditError::Storage(e.to_string()))?;
        if !keys.is_empty() {
            let _: () = conn
                .del(keys)
                .await
                .map_err(|e| BanditError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}
