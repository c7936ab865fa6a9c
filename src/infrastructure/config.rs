use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub profile: String,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            if profile == "default" {
                "sqlite://dojo.db?mode=rwc".to_string()
            } else {
                format!("sqlite://dojo_{}.db?mode=rwc", profile)
            }
        });

        Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(Vec::new),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            profile,
            seed_demo: env::var("SEED_DEMO").is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PROFILE",
        "DATABASE_URL",
        "PORT",
        "CORS_ALLOWED_ORIGINS",
        "UPLOAD_DIR",
        "SEED_DEMO",
    ];

    fn clear_env() {
        for var in VARS {
            // Tests touching the environment are serialized
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.database_url, "sqlite://dojo.db?mode=rwc");
        assert_eq!(config.port, 8000);
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(!config.seed_demo);
    }

    #[test]
    #[serial]
    fn test_profile_and_overrides() {
        clear_env();
        unsafe {
            env::set_var("PROFILE", "kids");
            env::set_var("PORT", "not-a-port");
            env::set_var("CORS_ALLOWED_ORIGINS", "http://a.test, ,http://b.test");
        }
        let config = Config::from_env();
        assert_eq!(config.database_url, "sqlite://dojo_kids.db?mode=rwc");
        assert_eq!(config.port, 8000);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        clear_env();
    }
}
