use async_trait::async_trait;
use mockall::mock;
use points_engine::{
    db_types::{Balance, Order, User, Withdrawal},
    traits::{AccountApiError, AccountManagement, AuthApiError, AuthManagement},
};

mock! {
    pub AuthManager {}
    #[async_trait]
    impl AuthManagement for AuthManager {
        async fn insert_user(&self, login: &str, password_digest: &str) -> Result<i64, AuthApiError>;
        async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, AuthApiError>;
    }
}

mock! {
    pub AccountManager {}
    #[async_trait]
    impl AccountManagement for AccountManager {
        async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError>;
        async fn balance_for_user(&self, user_id: i64) -> Result<Balance, AccountApiError>;
        async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError>;
    }
}
