use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

pub const API_KEY_VAR: &str = "NVIDIA_API_KEY";

const DEFAULT_API_BASE: &str = "https://integrate.api.nvidia.com/v1";
const DEFAULT_MODEL: &str = "meta/llama-3.1-8b-instruct";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:4173";
const DEFAULT_LOG_FILTER: &str = "info,tower_http=warn";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an AI assistant for Dame Abera, a Software Engineering student specializing in Full-Stack development and an AI Enthusiast. You should answer questions about him based on the following information:

Dame Abera builds real-world, containerized applications that prioritize scalability, security, and rapid delivery. He enjoys integrating AI into practical solutions and actively contributing to open-source projects that foster collaboration and innovation.

He has 2 years of experience and has completed over 20 projects.

His skills and expertise include:
- Frontend: React, TypeScript, TailwindCSS, Next.js
- Backend: Node.js, Python, Express, Django
- Database: PostgreSQL, Redis, Firebase

You can also provide his contact information:
- Email: dameabera11@gmail.com
- GitHub: https://github.com/Dame-Abera
- LinkedIn: https://www.linkedin.com/in/dame-abera-815960258/
- Twitter: https://x.com/dame_abera12

Always answer questions about Dame Abera in the third person. Do not act as Dame Abera himself, but as an informative assistant for him. If asked about your own identity, state that you are an AI assistant for Dame Abera.";

/**
 * \brief 启动阶段的配置错误，均为致命错误。
 */
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not set; refusing to start without a provider credential")]
    MissingCredential { key: &'static str },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("malformed .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

/**
 * \brief 补全客户端配置：Provider 地址、凭据、模型与采样参数，以及固定的系统提示词。
 * \details 启动时构造一次，之后只读。
 */
#[derive(Clone)]
pub struct CompletionSettings {
    /** \brief API 基地址，不含 `/chat/completions` */
    pub api_base: String,
    /** \brief Bearer 凭据 */
    pub api_key: String,
    /** \brief 模型名 */
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /** \brief 每次请求前置的系统提示词 */
    pub system_instruction: String,
}

impl CompletionSettings {
    /**
     * \brief 使用默认参数与给定凭据构造配置。
     */
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_base", &self.api_base)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_instruction_len", &self.system_instruction.len())
            .finish()
    }
}

/**
 * \brief HTTP 网关配置。
 */
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    /** \brief 允许跨域的来源列表；单个 `*` 表示任意来源 */
    pub allowed_origins: Vec<String>,
    /** \brief 生产模式下错误响应不附带 details */
    pub production: bool,
}

impl GatewaySettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

/**
 * \brief 日志配置。
 */
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /** \brief `EnvFilter` 指令，如 `info,tower_http=warn` */
    pub filter: String,
    /** \brief 额外追加日志的文件路径 */
    pub log_file: Option<PathBuf>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
        }
    }
}

/**
 * \brief 进程级配置集合。
 */
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub completion: CompletionSettings,
    pub gateway: GatewaySettings,
    pub telemetry: TelemetrySettings,
    /** \brief 实际读取到的 `.env` 路径 */
    pub dotenv_path: Option<PathBuf>,
}

impl AppSettings {
    /**
     * \brief 读取当前目录下的 `.env`（若存在）后从进程环境构造配置。
     */
    pub fn from_env() -> Result<Self, ConfigError> {
        let dotenv_path = load_dotenv_from(Path::new(".env"))?;
        let mut settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        settings.dotenv_path = dotenv_path;
        Ok(settings)
    }

    /**
     * \brief 从任意键值来源构造配置，缺少凭据时直接失败。
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingCredential { key: API_KEY_VAR })?;

        let mut completion = CompletionSettings::with_api_key(api_key);
        if let Some(base) = get("FOLIO_API_BASE") {
            completion.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("FOLIO_MODEL") {
            completion.model = model;
        }
        if let Some(raw) = get("FOLIO_TEMPERATURE") {
            completion.temperature = parse_temperature(raw)?;
        }
        if let Some(raw) = get("FOLIO_MAX_TOKENS") {
            completion.max_tokens = parse_value("FOLIO_MAX_TOKENS", raw)?;
        }
        // 提示词可能包含换行，不做 trim
        if let Some(prompt) = lookup("FOLIO_SYSTEM_PROMPT").filter(|p| !p.trim().is_empty()) {
            completion.system_instruction = prompt;
        }

        let mut gateway = GatewaySettings::default();
        if let Some(host) = get("FOLIO_HOST") {
            gateway.host = host;
        }
        if let Some(raw) = get("PORT") {
            gateway.port = parse_value("PORT", raw)?;
        }
        if let Some(raw) = get("FOLIO_ALLOWED_ORIGINS") {
            gateway.allowed_origins = split_origins(&raw);
        }
        gateway.production = get("FOLIO_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let mut telemetry = TelemetrySettings::default();
        if let Some(filter) = get("RUST_LOG") {
            telemetry.filter = filter;
        }
        telemetry.log_file = get("FOLIO_LOG_FILE").map(PathBuf::from);

        Ok(Self {
            completion,
            gateway,
            telemetry,
            dotenv_path: None,
        })
    }

    /**
     * \brief 记录配置摘要，不输出凭据。
     */
    pub fn log_summary(&self) {
        tracing::info!(
            api_base = %self.completion.api_base,
            model = %self.completion.model,
            temperature = self.completion.temperature,
            max_tokens = self.completion.max_tokens,
            "completion settings loaded"
        );
        tracing::info!(
            addr = %self.gateway.addr(),
            origins = ?self.gateway.allowed_origins,
            production = self.gateway.production,
            "gateway settings loaded"
        );
    }
}

/**
 * \brief 载入指定的 `.env` 文件；文件不存在时返回 `None`，格式错误时报错。
 * \details 此时日志尚未初始化，由调用方在之后记录返回的路径。
 */
pub fn load_dotenv_from(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(Some(path.to_path_buf())),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_temperature(raw: String) -> Result<f32, ConfigError> {
    // NaN/inf 会被序列化为 null
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConfigError::Invalid {
            key: "FOLIO_TEMPERATURE",
            value: raw,
        }),
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
