use std::future::Future;

use be_remote_db::{
    DatabaseManager, DbResult, LedgerOutcome, NewPayment, Payment, Promotion, Tariff,
};

/// Persistence behind payment generation and the merchant webhook.
///
/// Each transition method must lock the payment, decide the move with
/// [`be_remote_db::PaymentState::on`], and apply the purchase effect of a
/// performed payment in the same atomic step.
pub trait PaymentLedger: Send + Sync + 'static {
    fn card_owner(&self, card_id: i64) -> impl Future<Output = DbResult<Option<i64>>> + Send;

    fn get_tariff(&self, tariff_id: i64) -> impl Future<Output = DbResult<Tariff>> + Send;

    fn get_promotion(&self, promotion_id: i64)
    -> impl Future<Output = DbResult<Promotion>> + Send;

    fn create_payment(
        &self,
        payment: &NewPayment,
    ) -> impl Future<Output = DbResult<Payment>> + Send;

    fn payment_by_order_id(
        &self,
        order_id: &str,
    ) -> impl Future<Output = DbResult<Option<Payment>>> + Send;

    fn payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = DbResult<Option<Payment>>> + Send;

    fn create_transaction(
        &self,
        order_id: &str,
        transaction_id: &str,
        time_ms: i64,
    ) -> impl Future<Output = DbResult<LedgerOutcome>> + Send;

    fn perform_transaction(
        &self,
        order_id: &str,
        time_ms: i64,
    ) -> impl Future<Output = DbResult<LedgerOutcome>> + Send;

    fn cancel_transaction(
        &self,
        order_id: &str,
        reason: Option<i32>,
        time_ms: i64,
    ) -> impl Future<Output = DbResult<LedgerOutcome>> + Send;
}

impl PaymentLedger for DatabaseManager {
    async fn card_owner(&self, card_id: i64) -> DbResult<Option<i64>> {
        self.card_owner().card_id(card_id).call().await
    }

    async fn get_tariff(&self, tariff_id: i64) -> DbResult<Tariff> {
        self.get_tariff()
            .executor(&self.pool)
            .tariff_id(tariff_id)
            .call()
            .await
    }

    async fn get_promotion(&self, promotion_id: i64) -> DbResult<Promotion> {
        self.get_promotion()
            .executor(&self.pool)
            .promotion_id(promotion_id)
            .call()
            .await
    }

    async fn create_payment(&self, payment: &NewPayment) -> DbResult<Payment> {
        self.create_payment().payment(payment).call().await
    }

    async fn payment_by_order_id(&self, order_id: &str) -> DbResult<Option<Payment>> {
        self.get_payment_by_order_id()
            .order_id(order_id)
            .call()
            .await
    }

    async fn payment_by_transaction_id(&self, transaction_id: &str) -> DbResult<Option<Payment>> {
        self.get_payment_by_transaction_id()
            .transaction_id(transaction_id)
            .call()
            .await
    }

    async fn create_transaction(
        &self,
        order_id: &str,
        transaction_id: &str,
        time_ms: i64,
    ) -> DbResult<LedgerOutcome> {
        self.create_transaction()
            .order_id(order_id)
            .transaction_id(transaction_id)
            .time_ms(time_ms)
            .call()
            .await
    }

    async fn perform_transaction(&self, order_id: &str, time_ms: i64) -> DbResult<LedgerOutcome> {
        self.perform_transaction()
            .order_id(order_id)
            .time_ms(time_ms)
            .call()
            .await
    }

    async fn cancel_transaction(
        &self,
        order_id: &str,
        reason: Option<i32>,
        time_ms: i64,
    ) -> DbResult<LedgerOutcome> {
        self.cancel_transaction()
            .order_id(order_id)
            .maybe_reason(reason)
            .time_ms(time_ms)
            .call()
            .await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use be_remote_db::{DbError, LedgerEvent, PaymentState, Purchase, Transition};
    use chrono::{DateTime, Duration, Utc};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Activation {
        pub card_id: i64,
        pub promotion_id: i64,
        pub start_date: DateTime<Utc>,
        pub end_date: DateTime<Utc>,
    }

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        /// card id -> (owner, tariff id)
        cards: HashMap<i64, (i64, i64)>,
        tariffs: HashMap<i64, Tariff>,
        promotions: HashMap<i64, Promotion>,
        payments: Vec<Payment>,
        activations: Vec<Activation>,
        tariff_writes: usize,
    }

    /// In-process ledger driven by the same state machine as the database.
    #[derive(Default)]
    pub struct MemoryLedger {
        inner: Mutex<Inner>,
    }

    impl MemoryLedger {
        pub fn with_card(self, card_id: i64, owner: i64, tariff_id: i64) -> Self {
            self.inner
                .lock()
                .unwrap()
                .cards
                .insert(card_id, (owner, tariff_id));
            self
        }

        pub fn with_tariff(self, id: i64, price: i64) -> Self {
            let tariff = Tariff {
                id,
                name: format!("Tariff {id}"),
                min_phones: 1,
                max_phones: 3,
                min_socials: 0,
                max_socials: 1,
                min_photos: 1,
                max_photos: 5,
                max_description_length: 400,
                website_allowed: true,
                price,
                created_at: Utc::now(),
            };
            self.inner.lock().unwrap().tariffs.insert(id, tariff);
            self
        }

        pub fn with_promotion(self, id: i64, duration_days: i32, price: i64) -> Self {
            let promotion = Promotion {
                id,
                name: format!("Promotion {id}"),
                description: String::new(),
                duration_days,
                price,
                created_at: Utc::now(),
            };
            self.inner.lock().unwrap().promotions.insert(id, promotion);
            self
        }

        pub fn card_tariff(&self, card_id: i64) -> Option<i64> {
            self.inner
                .lock()
                .unwrap()
                .cards
                .get(&card_id)
                .map(|(_, tariff)| *tariff)
        }

        pub fn tariff_writes(&self) -> usize {
            self.inner.lock().unwrap().tariff_writes
        }

        pub fn activations(&self) -> Vec<Activation> {
            self.inner.lock().unwrap().activations.clone()
        }

        pub fn payment(&self, order_id: &str) -> Option<Payment> {
            self.inner
                .lock()
                .unwrap()
                .payments
                .iter()
                .find(|p| p.order_id == order_id)
                .cloned()
        }

        /// Inserts a pending payment directly, bypassing link generation.
        pub fn seed_payment(&self, order_id: &str, card_id: i64, purchase: Purchase, amount: i64) {
            let mut inner = self.inner.lock().unwrap();
            let payment = new_row(
                &mut *inner,
                &NewPayment {
                    order_id: order_id.to_string(),
                    user_id: 1,
                    card_id,
                    purchase,
                    amount,
                },
            );
            inner.payments.push(payment);
        }

        fn transition(
            &self,
            order_id: &str,
            event: LedgerEvent,
            write: impl FnOnce(&mut Inner, &mut Payment) -> DbResult<()>,
        ) -> DbResult<LedgerOutcome> {
            let mut inner = self.inner.lock().unwrap();
            let Some(pos) = inner.payments.iter().position(|p| p.order_id == order_id) else {
                return Ok(LedgerOutcome::NotFound);
            };
            let mut payment = inner.payments[pos].clone();

            Ok(match payment.state.on(event) {
                Transition::Advance { to } => {
                    write(&mut *inner, &mut payment)?;
                    payment.state = to;
                    payment.updated_at = Utc::now();
                    inner.payments[pos] = payment.clone();
                    LedgerOutcome::Applied(payment)
                }
                Transition::Replay => LedgerOutcome::Replayed(payment),
                Transition::Refused => LedgerOutcome::Refused(payment),
            })
        }
    }

    fn new_row(inner: &mut Inner, payment: &NewPayment) -> Payment {
        inner.next_id += 1;
        let now = Utc::now();
        Payment {
            id: inner.next_id,
            order_id: payment.order_id.clone(),
            user_id: payment.user_id,
            card_id: payment.card_id,
            payment_type: payment.purchase.payment_type(),
            tariff_id: payment.purchase.tariff_id(),
            promotion_id: payment.purchase.promotion_id(),
            amount: payment.amount,
            transaction_id: None,
            state: PaymentState::Pending,
            reason: None,
            create_time: None,
            perform_time: None,
            cancel_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_purchase(inner: &mut Inner, payment: &Payment) -> DbResult<()> {
        match payment.purchase() {
            Some(Purchase::Tariff(tariff_id)) => {
                if let Some(card) = inner.cards.get_mut(&payment.card_id) {
                    card.1 = tariff_id;
                    inner.tariff_writes += 1;
                }
            }
            Some(Purchase::Promotion(promotion_id)) => {
                let promotion = inner
                    .promotions
                    .get(&promotion_id)
                    .cloned()
                    .ok_or_else(|| DbError::not_found_with_id("promotion", promotion_id))?;
                if inner.cards.contains_key(&payment.card_id) {
                    let start_date = Utc::now();
                    inner.activations.push(Activation {
                        card_id: payment.card_id,
                        promotion_id,
                        start_date,
                        end_date: start_date + Duration::days(i64::from(promotion.duration_days)),
                    });
                }
            }
            None => return Err(DbError::Internal("payment has no target".into())),
        }
        Ok(())
    }

    impl PaymentLedger for MemoryLedger {
        async fn card_owner(&self, card_id: i64) -> DbResult<Option<i64>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .cards
                .get(&card_id)
                .map(|(owner, _)| *owner))
        }

        async fn get_tariff(&self, tariff_id: i64) -> DbResult<Tariff> {
            self.inner
                .lock()
                .unwrap()
                .tariffs
                .get(&tariff_id)
                .cloned()
                .ok_or_else(|| DbError::not_found_with_id("tariff", tariff_id))
        }

        async fn get_promotion(&self, promotion_id: i64) -> DbResult<Promotion> {
            self.inner
                .lock()
                .unwrap()
                .promotions
                .get(&promotion_id)
                .cloned()
                .ok_or_else(|| DbError::not_found_with_id("promotion", promotion_id))
        }

        async fn create_payment(&self, payment: &NewPayment) -> DbResult<Payment> {
            let mut inner = self.inner.lock().unwrap();
            if inner.payments.iter().any(|p| p.order_id == payment.order_id) {
                return Err(DbError::duplicate("order_id", payment.order_id.clone()));
            }
            let row = new_row(&mut *inner, payment);
            inner.payments.push(row.clone());
            Ok(row)
        }

        async fn payment_by_order_id(&self, order_id: &str) -> DbResult<Option<Payment>> {
            Ok(self.payment(order_id))
        }

        async fn payment_by_transaction_id(
            &self,
            transaction_id: &str,
        ) -> DbResult<Option<Payment>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .payments
                .iter()
                .rev()
                .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
                .cloned())
        }

        async fn create_transaction(
            &self,
            order_id: &str,
            transaction_id: &str,
            time_ms: i64,
        ) -> DbResult<LedgerOutcome> {
            self.transition(order_id, LedgerEvent::Create, |_, payment| {
                payment.transaction_id = Some(transaction_id.to_string());
                payment.create_time = payment.create_time.or(Some(time_ms));
                Ok(())
            })
        }

        async fn perform_transaction(
            &self,
            order_id: &str,
            time_ms: i64,
        ) -> DbResult<LedgerOutcome> {
            self.transition(order_id, LedgerEvent::Perform, |inner, payment| {
                apply_purchase(inner, payment)?;
                payment.perform_time = Some(time_ms);
                Ok(())
            })
        }

        async fn cancel_transaction(
            &self,
            order_id: &str,
            reason: Option<i32>,
            time_ms: i64,
        ) -> DbResult<LedgerOutcome> {
            self.transition(order_id, LedgerEvent::Cancel, |_, payment| {
                payment.reason = reason;
                payment.cancel_time = Some(time_ms);
                Ok(())
            })
        }
    }
}
