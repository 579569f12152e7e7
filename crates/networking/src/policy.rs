//! Effective per-navigation network policy.

use crate::config::NetworkConfig;
use crate::context::BrowsingContext;
use common::SettingKey;
use url::Url;

/// What to send in the DNT header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DoNotTrackPolicy {
    /// Send no DNT header.
    #[default]
    Skip,
    Allow,
    DoNotAllow,
}

impl DoNotTrackPolicy {
    pub fn from_setting(value: &str) -> Self {
        match value {
            "allow" => DoNotTrackPolicy::Allow,
            "doNotAllow" => DoNotTrackPolicy::DoNotAllow,
            _ => DoNotTrackPolicy::Skip,
        }
    }

    /// DNT header value, if one should be sent.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            DoNotTrackPolicy::Skip => None,
            DoNotTrackPolicy::Allow => Some("0"),
            DoNotTrackPolicy::DoNotAllow => Some("1"),
        }
    }
}

/// Which cookies a site may read and write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CookiePolicy {
    #[default]
    AcceptAll,
    Ignore,
    ReadOnly,
    /// Only cookies already in the store may be updated.
    AcceptExisting,
}

impl CookiePolicy {
    pub fn from_setting(value: &str) -> Self {
        match value {
            "ignore" => CookiePolicy::Ignore,
            "readOnly" => CookiePolicy::ReadOnly,
            "acceptExisting" => CookiePolicy::AcceptExisting,
            _ => CookiePolicy::AcceptAll,
        }
    }

    pub fn allows_read(&self) -> bool {
        *self != CookiePolicy::Ignore
    }
}

/// How long accepted cookies are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CookieKeepMode {
    #[default]
    UntilExpires,
    UntilExit,
    AskToKeep,
}

impl CookieKeepMode {
    pub fn from_setting(value: &str) -> Self {
        match value {
            "keepUntilExit" => CookieKeepMode::UntilExit,
            "ask" => CookieKeepMode::AskToKeep,
            _ => CookieKeepMode::UntilExpires,
        }
    }
}

/// Cookie part of the policy, as enforced by the cookie gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CookieSettings {
    pub first_party: CookiePolicy,
    pub third_party: CookiePolicy,
    pub keep_mode: CookieKeepMode,
}

/// Policy in force for one navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectivePolicy {
    /// Accept-Language override; empty means the process default.
    pub accept_language: String,
    pub user_agent: String,
    pub do_not_track: DoNotTrackPolicy,
    pub can_send_referrer: bool,
    pub first_party_cookies: CookiePolicy,
    pub third_party_cookies: CookiePolicy,
    pub cookie_keep_mode: CookieKeepMode,
}

impl EffectivePolicy {
    /// Policy used before the first navigation.
    pub fn initial(config: &NetworkConfig) -> Self {
        Self {
            accept_language: String::new(),
            user_agent: config.user_agent.clone(),
            do_not_track: DoNotTrackPolicy::Skip,
            can_send_referrer: true,
            first_party_cookies: CookiePolicy::AcceptAll,
            third_party_cookies: CookiePolicy::AcceptAll,
            cookie_keep_mode: CookieKeepMode::UntilExpires,
        }
    }

    /// Compute the policy for `scope` from the context's options.
    pub fn resolve(context: &dyn BrowsingContext, scope: Option<&Url>, config: &NetworkConfig) -> Self {
        let option = |key| context.option(key, scope);

        let accept_language = option(SettingKey::AcceptLanguage);
        let accept_language = match accept_language.as_text().trim() {
            "" => config.default_accept_language(),
            value => config.expand_accept_language(value),
        };
        let accept_language = if accept_language == config.default_accept_language() {
            String::new()
        } else {
            accept_language
        };

        let user_agent = config.user_agent_for(option(SettingKey::UserAgent).as_text());

        Self {
            accept_language,
            user_agent,
            do_not_track: DoNotTrackPolicy::from_setting(option(SettingKey::DoNotTrackPolicy).as_text()),
            can_send_referrer: option(SettingKey::EnableReferrer).as_bool().unwrap_or(true),
            first_party_cookies: CookiePolicy::from_setting(option(SettingKey::CookiesPolicy).as_text()),
            third_party_cookies: CookiePolicy::from_setting(
                option(SettingKey::ThirdPartyCookiesPolicy).as_text(),
            ),
            cookie_keep_mode: CookieKeepMode::from_setting(option(SettingKey::CookiesKeepMode).as_text()),
        }
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            first_party: self.first_party_cookies,
            third_party: self.third_party_cookies,
            keep_mode: self.cookie_keep_mode,
        }
    }
}
