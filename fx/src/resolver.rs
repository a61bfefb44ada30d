//! Pivot-based rate resolution.
//!
//! Only pivot-relative quotes are stored ("1 pivot = r target"). Every other
//! pair is derived by dividing the target's pivot rate by the base's pivot
//! rate, with the pivot itself synthesized as `1`.

use std::collections::BTreeMap;
use std::sync::Arc;

use pivotrate_common::{round_rate, Currency, CurrencyKey, RateRecord};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::conversion::{apply_rate, validate_quantity};
use crate::error::{FxError, FxResult};
use crate::store::RateStore;

/// Full rate table keyed by base-qualified key ("EURGBP").
pub type RateTable = BTreeMap<CurrencyKey, Decimal>;

/// Conversion results keyed by target currency.
pub type Conversions = BTreeMap<Currency, Decimal>;

/// Read-only query engine over a rate store.
pub struct RateResolver {
    store: Arc<dyn RateStore>,
    pivot: Currency,
}

impl RateResolver {
    /// Create a resolver quoting everything through `pivot`.
    pub fn new(store: Arc<dyn RateStore>, pivot: Currency) -> Self {
        Self { store, pivot }
    }

    /// The pivot currency.
    pub fn pivot(&self) -> &Currency {
        &self.pivot
    }

    /// Rate for 1 unit of `from` expressed in `to`, rounded to 6 places.
    #[instrument(skip(self))]
    pub async fn get_rate(&self, from: &str, to: &str) -> FxResult<Decimal> {
        let from = Currency::new(from);
        let to = Currency::new(to);
        self.rate_between(&from, &to).await
    }

    /// Every stored rate re-expressed against `from`.
    ///
    /// For the pivot this is the stored table unchanged. For any other base
    /// the base's own entry is left out.
    #[instrument(skip(self))]
    pub async fn get_rates(&self, from: &str) -> FxResult<RateTable> {
        let from = Currency::new(from);
        let records = self.store.list_all().await?;

        if from == self.pivot {
            return Ok(records
                .into_iter()
                .map(|r| (r.currency_key, r.rate))
                .collect());
        }

        let from_key = CurrencyKey::qualify(&self.pivot, &from);
        let from_rate = records
            .iter()
            .find(|r| r.currency_key == from_key)
            .filter(|r| r.is_usable())
            .map(|r| r.rate)
            .ok_or_else(|| FxError::UnknownCurrency(vec![from.clone()]))?;

        let mut table = RateTable::new();
        for record in records.iter().filter(|r| r.currency_key != from_key) {
            if !record.is_usable() {
                debug!(key = %record.currency_key, "Skipping non-positive rate");
                continue;
            }
            match record.currency_key.rebase(&self.pivot, &from) {
                Some(key) => {
                    let rate = cross_rate(&record.currency_key, record.rate, from_rate)?;
                    table.insert(key, rate);
                }
                None => {
                    debug!(key = %record.currency_key, "Skipping key not qualified by pivot");
                }
            }
        }

        Ok(table)
    }

    /// Convert `quantity` units of `from` into `to`.
    #[instrument(skip(self))]
    pub async fn convert(&self, from: &str, to: &str, quantity: Decimal) -> FxResult<Decimal> {
        let quantity = validate_quantity(quantity)?;
        let rate = self.get_rate(from, to).await?;
        apply_rate(quantity, rate)
    }

    /// Convert `quantity` units of `from` into each target.
    ///
    /// Fails on the first target that cannot be resolved; nothing is returned
    /// for the others.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn convert_many<S: AsRef<str>>(
        &self,
        from: &str,
        targets: &[S],
        quantity: Decimal,
    ) -> FxResult<Conversions> {
        let quantity = validate_quantity(quantity)?;

        let mut results = Conversions::new();
        for target in targets {
            let target = Currency::new(target);
            let converted = self.convert(from, target.code(), quantity).await?;
            results.insert(target, converted);
        }

        Ok(results)
    }

    async fn rate_between(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        let from_rate = self.pivot_rate(from).await?;
        let to_rate = self.pivot_rate(to).await?;

        match (from_rate, to_rate) {
            (Some(from_rate), Some(to_rate)) => {
                cross_rate(&CurrencyKey::qualify(from, to), to_rate, from_rate)
            }
            (from_rate, to_rate) => {
                let mut unknown = Vec::new();
                if from_rate.is_none() {
                    unknown.push(from.clone());
                }
                if to_rate.is_none() {
                    unknown.push(to.clone());
                }
                Err(FxError::UnknownCurrency(unknown))
            }
        }
    }

    /// Rate of 1 pivot in `currency`; the pivot itself is always `1`.
    async fn pivot_rate(&self, currency: &Currency) -> FxResult<Option<Decimal>> {
        if currency == &self.pivot {
            return Ok(Some(Decimal::ONE));
        }

        let key = CurrencyKey::qualify(&self.pivot, currency);
        let record = self.store.get(&key).await?;
        Ok(record.filter(RateRecord::is_usable).map(|r| r.rate))
    }
}

/// `to_rate / from_rate` rounded; both rates are positive.
fn cross_rate(key: &CurrencyKey, to_rate: Decimal, from_rate: Decimal) -> FxResult<Decimal> {
    to_rate
        .checked_div(from_rate)
        .map(round_rate)
        .ok_or_else(|| {
            FxError::RateOverflow(format!(
                "{} = {} / {} is out of range",
                key, to_rate, from_rate
            ))
        })
}
