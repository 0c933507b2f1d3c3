use crate::{auction::RngBackend, profit::DEFAULT_MAX_FORCE_LOSS_USD};
use alloy::{
    primitives::Address, rpc::client::BuiltInConnectionString, signers::local::PrivateKeySigner,
};
use eyre::{Result, WrapErr, eyre};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{env::VarError, fs, path::Path, str::FromStr};

const DEFAULT_DEPLOYMENT_FILE: &str = "draw-auction.toml";
const DEFAULT_NATIVE_DECIMALS: u8 = 18;
const DEFAULT_CLOSES_SOON_SECS: u64 = 300;
const DEFAULT_MAX_FEED_AGE_SECS: u64 = 86_400;
const DEFAULT_POLL_EVERY_BLOCKS: u64 = 1;

#[derive(Debug)]
pub struct Config {
    pub transport: BuiltInConnectionString,
    pub signer: PrivateKeySigner,
    pub reward_recipient: Address,
    pub min_profit_threshold_usd: Decimal,
    pub relay: RelayConfig,
    pub dry_run: bool,
    pub deployment: Deployment,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub use_private_relay: bool,
    pub endpoint: Option<BuiltInConnectionString>,
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub chain_id: u64,
    pub draw_manager: Address,
    pub prize_pool: Address,
    pub rng: RngBackend,
    pub native_usd_feed: Address,
    pub reward_usd_feed: Address,
    pub native_decimals: u8,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub max_force_loss_usd: Decimal,
    pub closes_soon_secs: u64,
    pub max_feed_age_secs: u64,
    pub require_sunk_cost_recipient: bool,
    pub poll_every_blocks: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let transport = parse_env("RPC_ENDPOINT", "HTTP/WS URL or IPC path", parse_transport)?;

        let signer = parse_env("PRIVATE_KEY", "hex private key", |value| {
            PrivateKeySigner::from_str(value)
                .map_err(|_| eyre!("PRIVATE_KEY is not a valid private key"))
        })?;

        let reward_recipient = parse_env("REWARD_RECIPIENT", "checksummed address", |value| {
            parse_address("REWARD_RECIPIENT", value)
        })?;

        let min_profit_threshold_usd =
            parse_env("MIN_PROFIT_THRESHOLD_USD", "decimal USD amount", |value| {
                parse_decimal("MIN_PROFIT_THRESHOLD_USD", value)
            })?;

        let use_private_relay =
            optional_env("USE_PRIVATE_RELAY", |value| parse_bool("USE_PRIVATE_RELAY", value))?
                .unwrap_or(false);
        let endpoint = optional_env("PRIVATE_RELAY_URL", parse_transport)?;
        if use_private_relay && endpoint.is_none() {
            return Err(eyre!("USE_PRIVATE_RELAY is set but PRIVATE_RELAY_URL is missing"));
        }

        let dry_run =
            optional_env("DRY_RUN", |value| parse_bool("DRY_RUN", value))?.unwrap_or(false);

        let deployment_path = optional_env("DEPLOYMENT_FILE", |value| Ok(value.to_string()))?
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT_FILE.to_string());
        let deployment = load_deployment(Path::new(&deployment_path))?;

        Ok(Self {
            transport,
            signer,
            reward_recipient,
            min_profit_threshold_usd,
            relay: RelayConfig {
                use_private_relay,
                endpoint,
            },
            dry_run,
            deployment,
        })
    }
}

fn load_deployment(path: &Path) -> Result<Deployment> {
    let contents = fs::read_to_string(path)
        .wrap_err(format!("failed to read deployment config at {}", path.display()))?;
    parse_deployment(&contents)
}

pub fn parse_deployment(contents: &str) -> Result<Deployment> {
    let file: DeploymentFile = toml::from_str(contents)
        .wrap_err("failed to parse deployment config (expected TOML format)")?;
    file.into_deployment()
}

#[derive(Debug, Deserialize)]
struct DeploymentFile {
    chain_id: u64,
    contracts: ContractsSpec,
    rng: RngSpec,
    prices: PricesSpec,
    #[serde(default)]
    policy: PolicySpec,
}

#[derive(Debug, Deserialize)]
struct ContractsSpec {
    draw_manager: String,
    prize_pool: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RngKind {
    Witnet,
    Blockhash,
}

#[derive(Debug, Deserialize)]
struct RngSpec {
    kind: RngKind,
    address: String,
}

#[derive(Debug, Deserialize)]
struct PricesSpec {
    native_usd_feed: String,
    reward_usd_feed: String,
    native_decimals: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicySpec {
    max_force_loss_usd: Option<String>,
    closes_soon_secs: Option<u64>,
    max_feed_age_secs: Option<u64>,
    require_sunk_cost_recipient: Option<bool>,
    poll_every_blocks: Option<u64>,
}

impl DeploymentFile {
    fn into_deployment(self) -> Result<Deployment> {
        let DeploymentFile {
            chain_id,
            contracts,
            rng,
            prices,
            policy,
        } = self;

        let rng_address = parse_address("rng.address", rng.address.trim())?;
        let rng = match rng.kind {
            RngKind::Witnet => RngBackend::Witnet(rng_address),
            RngKind::Blockhash => RngBackend::Blockhash(rng_address),
        };

        let max_force_loss_usd = match policy.max_force_loss_usd {
            Some(raw) => parse_decimal("policy.max_force_loss_usd", raw.trim())?,
            None => DEFAULT_MAX_FORCE_LOSS_USD,
        };

        let poll_every_blocks = policy.poll_every_blocks.unwrap_or(DEFAULT_POLL_EVERY_BLOCKS);
        if poll_every_blocks == 0 {
            return Err(eyre!("policy.poll_every_blocks must be at least 1"));
        }

        Ok(Deployment {
            chain_id,
            draw_manager: parse_address("contracts.draw_manager", contracts.draw_manager.trim())?,
            prize_pool: parse_address("contracts.prize_pool", contracts.prize_pool.trim())?,
            rng,
            native_usd_feed: parse_address("prices.native_usd_feed", prices.native_usd_feed.trim())?,
            reward_usd_feed: parse_address("prices.reward_usd_feed", prices.reward_usd_feed.trim())?,
            native_decimals: prices.native_decimals.unwrap_or(DEFAULT_NATIVE_DECIMALS),
            policy: PolicyConfig {
                max_force_loss_usd,
                closes_soon_secs: policy.closes_soon_secs.unwrap_or(DEFAULT_CLOSES_SOON_SECS),
                max_feed_age_secs: policy.max_feed_age_secs.unwrap_or(DEFAULT_MAX_FEED_AGE_SECS),
                require_sunk_cost_recipient: policy.require_sunk_cost_recipient.unwrap_or(false),
                poll_every_blocks,
            },
        })
    }
}

fn parse_transport(value: &str) -> Result<BuiltInConnectionString> {
    value
        .parse::<BuiltInConnectionString>()
        .map_err(|err| eyre!(err))
}

fn parse_address(key: &str, value: &str) -> Result<Address> {
    Address::parse_checksummed(value, None)
        .map_err(|_| eyre!("{key} is not a valid checksummed address: {value}"))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|_| eyre!("{key} is not a valid decimal number: {value}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(eyre!("{key} must be true or false, got {value}")),
    }
}

fn parse_env<T, F>(key: &str, desc: &str, parser: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    let raw = dotenvy::var(key).wrap_err(format!("missing {key} ({desc})"))?;
    let value = raw.trim();
    if value.is_empty() {
        return Err(eyre!("{key} cannot be empty ({desc})"));
    }

    parser(value)
}

fn optional_env<T, F>(key: &str, parser: F) -> Result<Option<T>>
where
    F: FnOnce(&str) -> Result<T>,
{
    match dotenvy::var(key) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(None)
            } else {
                parser(value).map(Some)
            }
        }
        Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
