#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use salon::completion::{AvailabilityLine, StockDeduction};
use salon::error::{AppError, AppResult};
use salon::model::profile::{NewProfile, Profile, ProfilePatch};
use salon::model::role::{AccessLevel, Role};
use salon::model::service::{Service, ServiceStatus};
use salon::model::user::SessionUser;
use salon::repository::{InventoryGateway, ProfileStore, SessionRevoker};

pub fn user(id: u64, email: &str) -> SessionUser {
    SessionUser {
        id,
        email: email.to_string(),
    }
}

pub fn profile(user_id: u64, role: Role, access_level: AccessLevel, is_active: bool) -> Profile {
    Profile {
        user_id,
        email: format!("user{user_id}@salon.test"),
        full_name: None,
        role,
        access_level,
        is_active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Profile table in memory. Lookups can be made to fail a number of times.
#[derive(Default)]
pub struct FakeProfileStore {
    pub profiles: Mutex<HashMap<u64, Profile>>,
    failures_left: AtomicU32,
    pub lookups: AtomicU32,
    pub inserts: AtomicU32,
    /// Simulates a concurrent request creating the row first.
    race_on_insert: AtomicBool,
    /// Simulates the user row being gone (foreign key failure).
    reject_inserts: AtomicBool,
}

impl FakeProfileStore {
    pub fn with_profile(profile: Profile) -> Self {
        let store = Self::default();
        store.put(profile);
        store
    }

    pub fn put(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.user_id, profile);
    }

    pub fn fail_next(&self, times: u32) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn race_on_insert(&self) {
        self.race_on_insert.store(true, Ordering::SeqCst);
    }

    pub fn reject_inserts(&self) {
        self.reject_inserts.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, user_id: u64) -> Option<Profile> {
        self.profiles.lock().unwrap().get(&user_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn find_by_user_id(&self, user_id: u64) -> AppResult<Option<Profile>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Database("connection reset by peer".to_string()));
        }
        Ok(self.get(user_id))
    }

    async fn insert(&self, new_profile: NewProfile) -> AppResult<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.reject_inserts.load(Ordering::SeqCst) {
            return Err(AppError::BadRequest(
                "Referenced record is missing or still in use".to_string(),
            ));
        }
        let mut stored = profile(new_profile.user_id, new_profile.role, AccessLevel::Full, true);
        stored.email = new_profile.email;

        let mut profiles = self.profiles.lock().unwrap();
        if self.race_on_insert.swap(false, Ordering::SeqCst) {
            profiles.insert(stored.user_id, stored);
            return Err(AppError::Conflict("Duplicate entry".to_string()));
        }
        if profiles.contains_key(&stored.user_id) {
            return Err(AppError::Conflict("Duplicate entry".to_string()));
        }
        profiles.insert(stored.user_id, stored);
        Ok(())
    }

    async fn update(&self, user_id: u64, patch: &ProfilePatch) -> AppResult<Option<Profile>> {
        let mut profiles = self.profiles.lock().unwrap();
        Ok(profiles.get_mut(&user_id).map(|p| {
            patch.apply(p);
            p.clone()
        }))
    }

    async fn list(&self) -> AppResult<Vec<Profile>> {
        Ok(self.profiles.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeRevoker {
    pub revoked: Mutex<Vec<u64>>,
}

impl FakeRevoker {
    pub fn revoked(&self) -> Vec<u64> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionRevoker for FakeRevoker {
    async fn revoke_all(&self, user_id: u64) -> AppResult<u64> {
        self.revoked.lock().unwrap().push(user_id);
        Ok(1)
    }
}

pub fn service(id: u64, worker_id: Option<u64>, commission_rate: Option<f64>) -> Service {
    Service {
        id,
        customer_id: 1,
        worker_id,
        service_name: "Balayage".to_string(),
        price: 200.0,
        status: ServiceStatus::InProgress.to_string(),
        commission_rate,
        scheduled_at: Utc::now(),
        notes: None,
        created_by: 1,
        created_at: Utc::now(),
    }
}

pub fn line(item_id: u64, required: i64, available: i64) -> AvailabilityLine {
    AvailabilityLine {
        item_id,
        item_name: format!("item-{item_id}"),
        required_quantity: required,
        available_stock: available,
    }
}

/// One service with its inventory lines.
pub struct FakeGateway {
    pub service: Mutex<Option<Service>>,
    pub lines: Mutex<Vec<AvailabilityLine>>,
    pub fail_earnings: AtomicBool,
    pub earnings: Mutex<Vec<(u64, u64, f64, f64)>>,
    pub completions: AtomicU32,
    /// Stock level another completion leaves behind between check and deduction.
    concurrent_sale: Mutex<Option<(u64, i64)>>,
}

impl FakeGateway {
    pub fn new(service: Service, lines: Vec<AvailabilityLine>) -> Self {
        Self {
            service: Mutex::new(Some(service)),
            lines: Mutex::new(lines),
            fail_earnings: AtomicBool::new(false),
            earnings: Mutex::new(Vec::new()),
            completions: AtomicU32::new(0),
            concurrent_sale: Mutex::new(None),
        }
    }

    pub fn restock(&self, item_id: u64, available: i64) {
        for l in self.lines.lock().unwrap().iter_mut() {
            if l.item_id == item_id {
                l.available_stock = available;
            }
        }
    }

    pub fn sell_before_deduction(&self, item_id: u64, left: i64) {
        *self.concurrent_sale.lock().unwrap() = Some((item_id, left));
    }

    pub fn status(&self) -> Option<String> {
        self.service.lock().unwrap().as_ref().map(|s| s.status.clone())
    }
}

#[async_trait]
impl InventoryGateway for FakeGateway {
    async fn find_service(&self, service_id: u64) -> AppResult<Option<Service>> {
        Ok(self
            .service
            .lock()
            .unwrap()
            .clone()
            .filter(|s| s.id == service_id))
    }

    async fn line_item_count(&self, _service_id: u64) -> AppResult<u64> {
        Ok(self.lines.lock().unwrap().len() as u64)
    }

    async fn check_availability(&self, _service_id: u64) -> AppResult<Vec<AvailabilityLine>> {
        Ok(self.lines.lock().unwrap().clone())
    }

    async fn complete_service(&self, _service_id: u64) -> AppResult<StockDeduction> {
        if let Some((item_id, left)) = self.concurrent_sale.lock().unwrap().take() {
            self.restock(item_id, left);
        }
        let short: Vec<AvailabilityLine> = self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.is_sufficient())
            .cloned()
            .collect();
        if !short.is_empty() {
            return Ok(StockDeduction::Short(short));
        }

        self.completions.fetch_add(1, Ordering::SeqCst);
        if let Some(s) = self.service.lock().unwrap().as_mut() {
            s.status = ServiceStatus::Completed.to_string();
        }
        for l in self.lines.lock().unwrap().iter_mut() {
            l.available_stock -= l.required_quantity;
        }
        Ok(StockDeduction::Completed)
    }

    async fn record_earnings(
        &self,
        worker_id: u64,
        service_id: u64,
        commission_rate: f64,
        amount: f64,
    ) -> AppResult<()> {
        if self.fail_earnings.load(Ordering::SeqCst) {
            return Err(AppError::Database("foreign key constraint fails".to_string()));
        }
        self.earnings
            .lock()
            .unwrap()
            .push((worker_id, service_id, commission_rate, amount));
        Ok(())
    }
}
