use crate::config::Config;
use crate::db::MongoDB;
use crate::email::EmailService;
use crate::notifier::NotificationServer;
use crate::sms::SmsService;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub notifier: Addr<NotificationServer>,
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub mailer: EmailService,
    pub sms: SmsService,
    pub http_client: reqwest::Client,
}
