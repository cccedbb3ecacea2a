use crate::{
    cache::{keys, TtlCache},
    entities::{
        city, delivery_rule, order, zone, City, CityModel, DeliveryRule,
        DeliveryRuleModel, Kitchen, Order, Zone, ZoneModel,
    },
    errors::ServiceError,
};
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCityInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCityInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateZoneInput {
    pub city_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[schema(value_type = String, example = "4.00")]
    pub delivery_fee: Decimal,
    pub kitchen_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateZoneInput {
    pub city_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub delivery_fee: Option<Decimal>,
    pub kitchen_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDeliveryRuleInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = 0, max = 30))]
    pub lead_days: i32,
    #[validate(range(min = 0, max = 23))]
    pub cutoff_hour: i32,
    /// Three letter day names, e.g. `["sun"]`
    #[serde(default)]
    pub closed_weekdays: Vec<String>,
    #[validate(range(min = 1, max = 90))]
    pub max_days_ahead: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryRuleInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 30))]
    pub lead_days: Option<i32>,
    #[validate(range(min = 0, max = 23))]
    pub cutoff_hour: Option<i32>,
    pub closed_weekdays: Option<Vec<String>>,
    #[validate(range(min = 1, max = 90))]
    pub max_days_ahead: Option<i32>,
    pub is_active: Option<bool>,
}

/// Delivery date rule in effect, resolved from the first active `delivery_rules` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub lead_days: i64,
    pub cutoff_hour: u32,
    pub closed_weekdays: Vec<Weekday>,
    pub max_days_ahead: i64,
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        Self {
            lead_days: 1,
            cutoff_hour: 14,
            closed_weekdays: Vec::new(),
            max_days_ahead: 14,
        }
    }
}

impl From<&DeliveryRuleModel> for DeliveryWindow {
    fn from(rule: &DeliveryRuleModel) -> Self {
        let closed_weekdays = rule
            .closed_weekdays
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .filter_map(|d| match d.parse::<Weekday>() {
                Ok(day) => Some(day),
                Err(_) => {
                    warn!(rule_id = %rule.id, day = d, "ignoring unknown weekday in delivery rule");
                    None
                }
            })
            .collect();
        Self {
            lead_days: i64::from(rule.lead_days.max(0)),
            cutoff_hour: u32::try_from(rule.cutoff_hour.clamp(0, 23)).unwrap_or(0),
            closed_weekdays,
            max_days_ahead: i64::from(rule.max_days_ahead.max(0)),
        }
    }
}

impl DeliveryWindow {
    /// First day a new order can be delivered, before closed days are considered
    fn first_candidate(&self, now_local: NaiveDateTime) -> NaiveDate {
        let mut days = self.lead_days;
        if now_local.hour() >= self.cutoff_hour {
            days += 1;
        }
        now_local.date() + Duration::days(days)
    }

    fn last_date(&self, now_local: NaiveDateTime) -> NaiveDate {
        now_local.date() + Duration::days(self.max_days_ahead)
    }

    fn is_open(&self, date: NaiveDate) -> bool {
        !self.closed_weekdays.contains(&date.weekday())
    }

    /// Every deliverable date in ascending order
    pub fn available_dates(&self, now_local: NaiveDateTime) -> Vec<NaiveDate> {
        let last = self.last_date(now_local);
        self.first_candidate(now_local)
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| self.is_open(*d))
            .collect()
    }

    pub fn earliest(&self, now_local: NaiveDateTime) -> Option<NaiveDate> {
        self.available_dates(now_local).into_iter().next()
    }

    pub fn validate(&self, now_local: NaiveDateTime, requested: NaiveDate) -> Result<(), ServiceError> {
        if requested < self.first_candidate(now_local) {
            return Err(ServiceError::ValidationError(format!(
                "delivery date {} is too soon",
                requested
            )));
        }
        if requested > self.last_date(now_local) {
            return Err(ServiceError::ValidationError(format!(
                "delivery date {} is too far ahead",
                requested
            )));
        }
        if !self.is_open(requested) {
            return Err(ServiceError::ValidationError(format!(
                "no deliveries on {}",
                requested.weekday()
            )));
        }
        Ok(())
    }
}

/// Parses a comma separated weekday list; returns the first unknown entry on failure
fn parse_weekdays(csv: &str) -> Result<Vec<Weekday>, String> {
    let mut days = Vec::new();
    for raw in csv.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let day: Weekday = raw.parse().map_err(|_| raw.to_string())?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

fn weekdays_to_csv(days: &[String]) -> Result<String, ServiceError> {
    let parsed = parse_weekdays(&days.join(",")).map_err(|bad| {
        ServiceError::ValidationError(format!("unknown weekday '{}'", bad))
    })?;
    Ok(parsed
        .iter()
        .map(|d| d.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(","))
}

/// Delivery dates as shown to the storefront
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryDates {
    pub earliest: Option<NaiveDate>,
    pub dates: Vec<NaiveDate>,
    pub cutoff_hour: u32,
}

/// Cities, zones and delivery date rules.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    cache: TtlCache,
    offset: FixedOffset,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, cache: TtlCache, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { db, cache, offset }
    }

    fn invalidate(&self) {
        self.cache.invalidate_prefix(keys::GEOGRAPHY);
    }

    /// Wall-clock time of the business
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    // Cities

    #[instrument(skip(self))]
    pub async fn list_cities(&self, active_only: bool) -> Result<Vec<CityModel>, ServiceError> {
        if !active_only {
            return Ok(City::find()
                .order_by_asc(city::Column::Name)
                .all(&*self.db)
                .await?);
        }

        self.cache
            .get_or_load(keys::CITIES, || async {
                Ok::<_, ServiceError>(
                    City::find()
                        .filter(city::Column::IsActive.eq(true))
                        .order_by_asc(city::Column::Name)
                        .all(&*self.db)
                        .await?,
                )
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_city(&self, id: Uuid) -> Result<CityModel, ServiceError> {
        City::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("City", id))
    }

    #[instrument(skip(self))]
    pub async fn create_city(&self, input: CreateCityInput) -> Result<CityModel, ServiceError> {
        input.validate()?;
        self.ensure_city_name_free(&input.name, None).await?;

        let now = Utc::now();
        let city = city::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.invalidate();
        info!(city_id = %city.id, "city created");
        Ok(city)
    }

    #[instrument(skip(self))]
    pub async fn update_city(&self, id: Uuid, input: UpdateCityInput) -> Result<CityModel, ServiceError> {
        input.validate()?;
        let existing = self.get_city(id).await?;
        if let Some(name) = &input.name {
            self.ensure_city_name_free(name, Some(id)).await?;
        }

        let mut city: city::ActiveModel = existing.into();
        if let Some(name) = input.name {
            city.name = Set(name.trim().to_string());
        }
        if let Some(is_active) = input.is_active {
            city.is_active = Set(is_active);
        }
        city.updated_at = Set(Utc::now());
        let city = city.update(&*self.db).await?;

        self.invalidate();
        Ok(city)
    }

    #[instrument(skip(self))]
    pub async fn delete_city(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_city(id).await?;

        let zones = Zone::find()
            .filter(zone::Column::CityId.eq(id))
            .count(&*self.db)
            .await?;
        if zones > 0 {
            return Err(ServiceError::Conflict(format!(
                "city {} still has {} zones",
                id, zones
            )));
        }

        City::delete_by_id(id).exec(&*self.db).await?;
        self.invalidate();
        info!(city_id = %id, "city deleted");
        Ok(())
    }

    async fn ensure_city_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = City::find().filter(city::Column::Name.eq(name.trim()));
        if let Some(id) = except {
            query = query.filter(city::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "city '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }

    // Zones

    #[instrument(skip(self))]
    pub async fn list_zones(
        &self,
        city_id: Option<Uuid>,
        active_only: bool,
    ) -> Result<Vec<ZoneModel>, ServiceError> {
        let load = || async {
            let mut query = Zone::find();
            if let Some(city_id) = city_id {
                query = query.filter(zone::Column::CityId.eq(city_id));
            }
            if active_only {
                query = query.filter(zone::Column::IsActive.eq(true));
            }
            Ok::<_, ServiceError>(query.order_by_asc(zone::Column::Name).all(&*self.db).await?)
        };

        match (city_id, active_only) {
            (Some(city_id), true) => {
                self.cache
                    .get_or_load(&keys::zones_for_city(city_id), load)
                    .await
            }
            _ => load().await,
        }
    }

    /// Active zones of an active city, for the storefront
    #[instrument(skip(self))]
    pub async fn list_city_zones(&self, city_id: Uuid) -> Result<Vec<ZoneModel>, ServiceError> {
        let city = self.get_city(city_id).await?;
        if !city.is_active {
            return Err(ServiceError::not_found("City", city_id));
        }
        self.list_zones(Some(city_id), true).await
    }

    #[instrument(skip(self))]
    pub async fn get_zone(&self, id: Uuid) -> Result<ZoneModel, ServiceError> {
        Zone::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Zone", id))
    }

    /// Zone that currently accepts orders: the zone and its city are both active
    #[instrument(skip(self))]
    pub async fn get_active_zone(&self, id: Uuid) -> Result<ZoneModel, ServiceError> {
        let zone = self.get_zone(id).await?;
        let city = self.get_city(zone.city_id).await?;
        if !zone.is_active || !city.is_active {
            return Err(ServiceError::ValidationError(format!(
                "zone {} is not accepting deliveries",
                id
            )));
        }
        Ok(zone)
    }

    async fn ensure_kitchen(&self, kitchen_id: Uuid) -> Result<(), ServiceError> {
        Kitchen::find_by_id(kitchen_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Kitchen", kitchen_id))
    }

    fn validate_fee(fee: Decimal) -> Result<(), ServiceError> {
        if fee < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "delivery_fee cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_zone(&self, input: CreateZoneInput) -> Result<ZoneModel, ServiceError> {
        input.validate()?;
        Self::validate_fee(input.delivery_fee)?;
        self.get_city(input.city_id).await?;
        if let Some(kitchen_id) = input.kitchen_id {
            self.ensure_kitchen(kitchen_id).await?;
        }

        let now = Utc::now();
        let zone = zone::ActiveModel {
            id: Set(Uuid::new_v4()),
            city_id: Set(input.city_id),
            name: Set(input.name.trim().to_string()),
            delivery_fee: Set(input.delivery_fee),
            kitchen_id: Set(input.kitchen_id),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.invalidate();
        info!(zone_id = %zone.id, city_id = %zone.city_id, "zone created");
        Ok(zone)
    }

    #[instrument(skip(self))]
    pub async fn update_zone(&self, id: Uuid, input: UpdateZoneInput) -> Result<ZoneModel, ServiceError> {
        input.validate()?;
        let existing = self.get_zone(id).await?;

        let mut zone: zone::ActiveModel = existing.into();
        if let Some(city_id) = input.city_id {
            self.get_city(city_id).await?;
            zone.city_id = Set(city_id);
        }
        if let Some(name) = input.name {
            zone.name = Set(name.trim().to_string());
        }
        if let Some(fee) = input.delivery_fee {
            Self::validate_fee(fee)?;
            zone.delivery_fee = Set(fee);
        }
        if let Some(kitchen_id) = input.kitchen_id {
            self.ensure_kitchen(kitchen_id).await?;
            zone.kitchen_id = Set(Some(kitchen_id));
        }
        if let Some(is_active) = input.is_active {
            zone.is_active = Set(is_active);
        }
        zone.updated_at = Set(Utc::now());
        let zone = zone.update(&*self.db).await?;

        self.invalidate();
        Ok(zone)
    }

    #[instrument(skip(self))]
    pub async fn delete_zone(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_zone(id).await?;

        let orders = Order::find()
            .filter(order::Column::ZoneId.eq(id))
            .count(&*self.db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "zone {} has {} orders; deactivate it instead",
                id, orders
            )));
        }

        Zone::delete_by_id(id).exec(&*self.db).await?;
        self.invalidate();
        info!(zone_id = %id, "zone deleted");
        Ok(())
    }

    // Delivery rules

    #[instrument(skip(self))]
    pub async fn list_rules(&self) -> Result<Vec<DeliveryRuleModel>, ServiceError> {
        Ok(DeliveryRule::find()
            .order_by_asc(delivery_rule::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_rule(&self, id: Uuid) -> Result<DeliveryRuleModel, ServiceError> {
        DeliveryRule::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery rule", id))
    }

    #[instrument(skip(self))]
    pub async fn create_rule(&self, input: CreateDeliveryRuleInput) -> Result<DeliveryRuleModel, ServiceError> {
        input.validate()?;
        let closed = weekdays_to_csv(&input.closed_weekdays)?;

        let now = Utc::now();
        let rule = delivery_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            lead_days: Set(input.lead_days),
            cutoff_hour: Set(input.cutoff_hour),
            closed_weekdays: Set(closed),
            max_days_ahead: Set(input.max_days_ahead),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.invalidate();
        Ok(rule)
    }

    #[instrument(skip(self))]
    pub async fn update_rule(
        &self,
        id: Uuid,
        input: UpdateDeliveryRuleInput,
    ) -> Result<DeliveryRuleModel, ServiceError> {
        input.validate()?;
        let existing = self.get_rule(id).await?;

        let mut rule: delivery_rule::ActiveModel = existing.into();
        if let Some(name) = input.name {
            rule.name = Set(name.trim().to_string());
        }
        if let Some(lead_days) = input.lead_days {
            rule.lead_days = Set(lead_days);
        }
        if let Some(cutoff_hour) = input.cutoff_hour {
            rule.cutoff_hour = Set(cutoff_hour);
        }
        if let Some(days) = input.closed_weekdays {
            rule.closed_weekdays = Set(weekdays_to_csv(&days)?);
        }
        if let Some(max_days_ahead) = input.max_days_ahead {
            rule.max_days_ahead = Set(max_days_ahead);
        }
        if let Some(is_active) = input.is_active {
            rule.is_active = Set(is_active);
        }
        rule.updated_at = Set(Utc::now());
        let rule = rule.update(&*self.db).await?;

        self.invalidate();
        Ok(rule)
    }

    #[instrument(skip(self))]
    pub async fn delete_rule(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_rule(id).await?;
        DeliveryRule::delete_by_id(id).exec(&*self.db).await?;
        self.invalidate();
        Ok(())
    }

    /// Oldest active rule, or the built-in default when none is configured
    #[instrument(skip(self))]
    pub async fn active_window(&self) -> Result<DeliveryWindow, ServiceError> {
        self.cache
            .get_or_load(keys::DELIVERY_RULE, || async {
                let rule = DeliveryRule::find()
                    .filter(delivery_rule::Column::IsActive.eq(true))
                    .order_by_asc(delivery_rule::Column::CreatedAt)
                    .one(&*self.db)
                    .await?;
                Ok::<_, ServiceError>(rule.as_ref().map(DeliveryWindow::from).unwrap_or_default())
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn available_dates(&self) -> Result<DeliveryDates, ServiceError> {
        let window = self.active_window().await?;
        let dates = window.available_dates(self.now_local());
        Ok(DeliveryDates {
            earliest: dates.first().copied(),
            dates,
            cutoff_hour: window.cutoff_hour,
        })
    }

    /// Checks a requested date, or picks the earliest when none was given
    #[instrument(skip(self))]
    pub async fn resolve_delivery_date(&self, requested: Option<NaiveDate>) -> Result<NaiveDate, ServiceError> {
        let window = self.active_window().await?;
        let now = self.now_local();
        match requested {
            Some(date) => {
                window.validate(now, date)?;
                Ok(date)
            }
            None => window.earliest(now).ok_or_else(|| {
                ServiceError::ValidationError("no delivery dates are available".to_string())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(date: &str, hour: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    // 2025-03-03 is a Monday
    #[rstest]
    #[case(9, "2025-03-04")]
    #[case(13, "2025-03-04")]
    #[case(14, "2025-03-05")]
    #[case(22, "2025-03-05")]
    fn cutoff_pushes_earliest_by_one_day(#[case] hour: u32, #[case] expected: &str) {
        let window = DeliveryWindow::default();
        assert_eq!(window.earliest(at("2025-03-03", hour)), Some(day(expected)));
    }

    #[test]
    fn closed_weekdays_are_skipped() {
        let window = DeliveryWindow {
            lead_days: 0,
            cutoff_hour: 23,
            closed_weekdays: vec![Weekday::Tue, Weekday::Wed],
            max_days_ahead: 7,
        };
        let dates = window.available_dates(at("2025-03-03", 8));

        assert_eq!(dates.first(), Some(&day("2025-03-03")));
        assert!(!dates.contains(&day("2025-03-04")));
        assert!(!dates.contains(&day("2025-03-05")));
        assert_eq!(dates.last(), Some(&day("2025-03-10")));
        assert_eq!(dates.len(), 6);
    }

    #[test]
    fn validate_rejects_early_late_and_closed_dates() {
        let window = DeliveryWindow {
            closed_weekdays: vec![Weekday::Sun],
            ..Default::default()
        };
        let now = at("2025-03-03", 10);

        assert!(window.validate(now, day("2025-03-04")).is_ok());
        assert_matches!(window.validate(now, day("2025-03-03")), Err(ServiceError::ValidationError(_)));
        assert_matches!(window.validate(now, day("2025-03-09")), Err(ServiceError::ValidationError(_)));
        assert_matches!(window.validate(now, day("2025-03-18")), Err(ServiceError::ValidationError(_)));
        assert!(window.validate(now, day("2025-03-17")).is_ok());
    }

    #[test]
    fn weekday_csv_is_normalised() {
        let csv = weekdays_to_csv(&["Sun".into(), "monday".into(), "sun".into()]).unwrap();
        assert_eq!(csv, "sun,mon");
        assert_matches!(
            weekdays_to_csv(&["someday".into()]),
            Err(ServiceError::ValidationError(_))
        );
    }

    async fn service() -> DeliveryService {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        DeliveryService::new(Arc::new(db), TtlCache::default(), 0)
    }

    #[tokio::test]
    async fn city_with_zones_cannot_be_deleted() {
        let delivery = service().await;
        let city = delivery
            .create_city(CreateCityInput {
                name: "Springfield".into(),
                is_active: None,
            })
            .await
            .unwrap();
        let zone = delivery
            .create_zone(CreateZoneInput {
                city_id: city.id,
                name: "Downtown".into(),
                delivery_fee: dec!(4.00),
                kitchen_id: None,
                is_active: None,
            })
            .await
            .unwrap();

        assert_matches!(delivery.delete_city(city.id).await, Err(ServiceError::Conflict(_)));

        delivery.delete_zone(zone.id).await.unwrap();
        delivery.delete_city(city.id).await.unwrap();
        assert_matches!(delivery.get_city(city.id).await, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn zone_in_inactive_city_is_not_orderable() {
        let delivery = service().await;
        let city = delivery
            .create_city(CreateCityInput {
                name: "Shelbyville".into(),
                is_active: Some(false),
            })
            .await
            .unwrap();
        let zone = delivery
            .create_zone(CreateZoneInput {
                city_id: city.id,
                name: "North".into(),
                delivery_fee: dec!(0.25),
                kitchen_id: None,
                is_active: None,
            })
            .await
            .unwrap();

        assert_matches!(
            delivery.get_active_zone(zone.id).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn active_window_falls_back_to_default_and_follows_rules() {
        let delivery = service().await;
        assert_eq!(delivery.active_window().await.unwrap(), DeliveryWindow::default());

        delivery
            .create_rule(CreateDeliveryRuleInput {
                name: "Weekdays".into(),
                lead_days: 2,
                cutoff_hour: 12,
                closed_weekdays: vec!["sat".into(), "sun".into()],
                max_days_ahead: 10,
                is_active: None,
            })
            .await
            .unwrap();

        let window = delivery.active_window().await.unwrap();
        assert_eq!(window.lead_days, 2);
        assert_eq!(window.closed_weekdays, vec![Weekday::Sat, Weekday::Sun]);
    }
}
