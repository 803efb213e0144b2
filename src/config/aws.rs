use std::env;

const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Credentials and identity injected by the Lambda sandbox, used to sign KMS requests.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsConfig {
    pub region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: String,
    pub function_name: String,
}

impl AwsConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            region: env::var(AWS_DEFAULT_REGION).unwrap_or("us-east-1".to_string()),
            aws_access_key_id: env::var(AWS_ACCESS_KEY_ID).unwrap_or_default(),
            aws_secret_access_key: env::var(AWS_SECRET_ACCESS_KEY).unwrap_or_default(),
            aws_session_token: env::var(AWS_SESSION_TOKEN).unwrap_or_default(),
            function_name: env::var(AWS_LAMBDA_FUNCTION_NAME).unwrap_or_default(),
        }
    }

    /// Top level domain of the AWS partition serving this region.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        if self.region.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env(AWS_ACCESS_KEY_ID, "AKIDEXAMPLE");
            jail.set_env(AWS_LAMBDA_FUNCTION_NAME, "log-forwarder");

            let aws_config = AwsConfig::from_env();
            assert_eq!(aws_config.region, "us-east-1");
            assert_eq!(aws_config.aws_access_key_id, "AKIDEXAMPLE");
            assert_eq!(aws_config.function_name, "log-forwarder");
            assert_eq!(aws_config.aws_session_token, "");
            Ok(())
        });
    }

    #[test]
    fn test_domain_by_region() {
        let mut aws_config = AwsConfig {
            region: "cn-north-1".to_string(),
            ..AwsConfig::default()
        };
        assert_eq!(aws_config.domain(), "amazonaws.com.cn");
        aws_config.region = "eu-west-1".to_string();
        assert_eq!(aws_config.domain(), "amazonaws.com");
    }
}
