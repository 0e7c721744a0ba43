/// 反代服务配置
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// 是否允许局域网访问
    /// - false: 仅本机访问 127.0.0.1（默认）
    /// - true: 允许局域网访问 0.0.0.0
    pub allow_lan_access: bool,

    /// 监听端口
    pub port: u16,

    /// 上游请求超时时间(秒), None 表示不设置额外超时
    pub request_timeout: Option<u64>,

    /// 无服务名时重定向的目标路径
    pub discovery_path: String,

    /// 上游代理配置
    pub upstream_proxy: UpstreamProxyConfig,
}

/// 上游代理配置
#[derive(Debug, Clone, Default)]
pub struct UpstreamProxyConfig {
    /// 是否启用
    pub enabled: bool,
    /// 代理地址 (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: 8045,
            request_timeout: None,
            discovery_path: DEFAULT_DISCOVERY_PATH.to_string(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

pub const DEFAULT_DISCOVERY_PATH: &str = "/api/services";

impl ProxyConfig {
    /// 获取实际的监听地址
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}
