//! AWS SDK client bundle.

use aws_config::BehaviorVersion;

/// Bundle of AWS SDK clients sharing one resolved [`aws_config::SdkConfig`].
#[derive(Clone, Debug)]
pub struct AwsClients {
    /// Secrets Manager client used to fetch the encryption key and DB credentials.
    pub secretsmanager: aws_sdk_secretsmanager::Client,
}

impl AwsClients {
    /// Initialise the AWS SDK clients.
    ///
    /// Credentials and region come from the standard AWS provider chain. When
    /// `endpoint_url` is set (e.g. a LocalStack container during development)
    /// Secrets Manager calls are sent there instead of the regional endpoint.
    pub async fn init(endpoint_url: Option<&str>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }

        Self {
            secretsmanager: aws_sdk_secretsmanager::Client::from_conf(builder.build()),
        }
    }
}
