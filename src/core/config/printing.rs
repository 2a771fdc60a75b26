use crate::core::config::defaults::GatewayConfig;

impl GatewayConfig {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  base-url: {}", self.base_url);
        println!("  model: {}", self.model);
        match &self.api_token {
            Some(_) => println!("  api-token: (set)"),
            None => println!("  api-token: (unset)"),
        }
        println!("  connect-timeout: {}s", self.connect_timeout.as_secs());
        println!("  request-timeout: {}s", self.request_timeout.as_secs());
        println!(
            "  stream-idle-timeout: {}s",
            self.stream_idle_timeout.as_secs()
        );
        println!(
            "  retry: {} attempts, {}ms initial backoff (max {}ms)",
            self.retry.attempts(),
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms
        );
    }
}
