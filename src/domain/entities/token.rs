//! # Token Entity
//!
//! OAuth2トークンのドメインエンティティ

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth2トークン
///
/// プロセス再起動をまたいで再利用するため、トークンテーブルに1行として保存される
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// 有効期限をUTCに正規化したトークンを作成
    pub fn new<Tz: chrono::TimeZone>(
        access_token: Option<String>,
        scope: Option<String>,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Tz>>,
    ) -> Self {
        Self {
            access_token,
            scope,
            token_type,
            refresh_token,
            expiry: expiry.map(|e| e.with_timezone(&Utc)),
        }
    }

    /// アクセストークンが空でないか
    pub fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// リフレッシュトークンが空でないか
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// `margin` 以内に期限切れになるか
    ///
    /// 有効期限が無いトークンは期限切れとみなさない。
    /// `expiry - margin` が表現できないほどマージンが大きい場合は期限切れ扱い
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => match expiry.checked_sub_signed(margin) {
                Some(limit) => limit <= now,
                None => margin > Duration::zero(),
            },
            None => false,
        }
    }

    /// 使用可能か（アクセストークンがあり、期限切れでない）
    pub fn is_valid(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.has_access_token() && !self.expires_within(margin, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn token_expiring_at(expiry: Option<DateTime<Utc>>) -> Token {
        Token {
            access_token: Some("ya29.access".to_string()),
            scope: None,
            token_type: Some("Bearer".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            expiry,
        }
    }

    #[test]
    fn test_new_normalizes_expiry_to_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let token = Token::new(None, None, None, None, Some(local));

        assert_eq!(
            token.expiry,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_expires_within_margin() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let token = token_expiring_at(Some(now + Duration::seconds(30)));

        assert!(token.expires_within(Duration::seconds(60), now));
        assert!(!token.expires_within(Duration::seconds(10), now));
    }

    #[test]
    fn test_expires_within_huge_margin() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let token = token_expiring_at(Some(now + Duration::hours(1)));

        assert!(token.expires_within(Duration::MAX, now));
        assert!(!token.expires_within(Duration::MIN, now));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let now = Utc::now();
        let token = token_expiring_at(None);
        assert!(!token.expires_within(Duration::days(365), now));
        assert!(token.is_valid(Duration::zero(), now));
    }

    #[test]
    fn test_empty_access_token_is_invalid() {
        let now = Utc::now();
        let mut token = token_expiring_at(None);
        token.access_token = Some(String::new());
        assert!(!token.has_access_token());
        assert!(!token.is_valid(Duration::zero(), now));
    }

    #[test]
    fn test_has_refresh_token() {
        let mut token = token_expiring_at(None);
        assert!(token.has_refresh_token());
        token.refresh_token = None;
        assert!(!token.has_refresh_token());
    }
}
