//! Unit-of-work and transaction scopes.
//!
//! A [`Store`] owns the connection handle and the shared [`Domain`]. Every write goes
//! through a [`UnitOfWork`], which wraps exactly one storage transaction:
//!
//! ```text
//! Open -> (mutations...) -> Committing -> Closed
//!                        \-> Failing -> RollingBack -> Closed
//! ```
//!
//! Each mutation runs the lifecycle hooks, then the constraint validator, then the
//! integrity pre-checks, and only then stages the statement inside the transaction.
//! Any failed mutation poisons the scope; a poisoned scope refuses further work and can
//! only roll back. Rules spanning related rows are checked when the scope commits.

use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter,
    TransactionTrait,
};
use std::{collections::BTreeSet, fmt, future::Future, pin::Pin, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

use super::Domain;
use super::constraints::ProductState;
use super::hooks::HookContext;
use super::integrity;
use super::record::{Record, Touch};
use crate::entities::{
    OrderProduct, ProductPromotionEvent, StockManagement, order_product, product,
    product_promotion_event, stock_management,
};
use crate::errors::{Error, Result};

/// Boxed future returned by the work closure of [`Store::run_in_transaction`].
pub type WorkFuture<'u, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'u>>;

/// Lifecycle state of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting mutations
    Open,
    /// Running deferred checks and committing
    Committing,
    /// A mutation failed; only rollback is possible
    Failing,
    /// Discarding staged work
    RollingBack,
    /// Terminal; the transaction has been released
    Closed,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Failing => "failing",
            Self::RollingBack => "rolling back",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Entry point for writes: a connection handle plus the inventory domain.
#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
    domain: Arc<Domain>,
}

impl Store {
    /// Store over `db` with the standard inventory domain.
    pub fn new(db: DatabaseConnection) -> Result<Self> {
        Ok(Self::with_domain(db, Arc::new(Domain::inventory()?)))
    }

    /// Store over `db` with a caller-built domain.
    #[must_use]
    pub const fn with_domain(db: DatabaseConnection, domain: Arc<Domain>) -> Self {
        Self { db, domain }
    }

    /// The underlying connection, for reads outside any scope.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The shared domain.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Opens a new transaction scope.
    #[instrument(skip(self))]
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let txn = self.db.begin().await.map_err(|e| Error::Transaction {
            message: format!("begin failed: {e}"),
        })?;
        debug!("unit of work opened");
        Ok(UnitOfWork::new(txn, Arc::clone(&self.domain)))
    }

    /// Runs `work` inside a fresh scope. Commits when it returns `Ok`; otherwise rolls
    /// back and returns the error `work` produced.
    ///
    /// ```ignore
    /// let product = store
    ///     .run_in_transaction(move |uow| {
    ///         Box::pin(async move {
    ///             let product = uow.create(draft).await?;
    ///             uow.set_stock(product.id, 5).await?;
    ///             Ok(product)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> WorkFuture<'u, T> + Send,
    {
        let mut uow = self.begin().await?;
        match work(&mut uow).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                warn!("transaction work failed, rolling back: {}", err);
                if let Err(rollback_err) = uow.rollback().await {
                    error!("rollback after failed work also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Loads a committed row by primary key.
    pub async fn find<M: Record>(&self, id: i64) -> Result<Option<M>> {
        M::find_by_id(&self.db, id).await
    }
}

/// One transaction scope. Not reusable once closed.
///
/// Dropping an unfinished scope rolls its transaction back.
pub struct UnitOfWork {
    txn: Option<DatabaseTransaction>,
    domain: Arc<Domain>,
    state: ScopeState,
    touched_products: BTreeSet<i64>,
    touched_events: BTreeSet<i64>,
    writes: usize,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("state", &self.state)
            .field("writes", &self.writes)
            .field("touched_products", &self.touched_products)
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    fn new(txn: DatabaseTransaction, domain: Arc<Domain>) -> Self {
        Self {
            txn: Some(txn),
            domain,
            state: ScopeState::Open,
            touched_products: BTreeSet::new(),
            touched_events: BTreeSet::new(),
            writes: 0,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> ScopeState {
        self.state
    }

    /// Number of statements staged so far
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// The open transaction, for reads that must see staged writes.
    pub fn transaction(&self) -> Result<&DatabaseTransaction> {
        match (&self.txn, self.state) {
            (Some(txn), ScopeState::Open) => Ok(txn),
            (_, state) => Err(Error::Transaction {
                message: format!("unit of work is {state}"),
            }),
        }
    }

    /// Loads a row by primary key, seeing writes staged in this scope.
    pub async fn find<M: Record>(&self, id: i64) -> Result<Option<M>> {
        M::find_by_id(self.transaction()?, id).await
    }

    /// Normalizes, validates and inserts `record`. Returns the stored row with its
    /// assigned primary key.
    #[instrument(skip(self, record), fields(entity = M::ENTITY))]
    pub async fn create<M: Record>(&mut self, record: M) -> Result<M> {
        let result = self.stage_create(record).await;
        let created = self.settle(result)?;
        self.writes += 1;
        self.touch(created.touches());
        Ok(created)
    }

    /// Normalizes, validates and overwrites the row with `record`'s primary key.
    #[instrument(skip(self, record), fields(entity = M::ENTITY, id = record.id()))]
    pub async fn update<M: Record>(&mut self, record: M) -> Result<M> {
        let result = self.stage_update(record).await;
        let (previous, updated) = self.settle(result)?;
        self.writes += 1;
        self.touch(previous.touches());
        self.touch(updated.touches());
        Ok(updated)
    }

    /// Deletes row `id` of `M`, refusing while any other row references it.
    #[instrument(skip(self), fields(entity = M::ENTITY))]
    pub async fn delete<M: Record>(&mut self, id: i64) -> Result<()> {
        let result = self.stage_delete::<M>(id).await;
        let deleted = self.settle(result)?;
        self.writes += 1;
        self.touch(deleted.touches());
        Ok(())
    }

    /// Links a product to a promotion event.
    pub async fn link_promotion(
        &mut self,
        product_id: i64,
        promotion_event_id: i64,
    ) -> Result<product_promotion_event::Model> {
        self.create(product_promotion_event::Model::new(product_id, promotion_event_id))
            .await
    }

    /// Removes the link between a product and a promotion event.
    pub async fn unlink_promotion(&mut self, product_id: i64, promotion_event_id: i64) -> Result<()> {
        let found = ProductPromotionEvent::find()
            .filter(product_promotion_event::Column::ProductId.eq(product_id))
            .filter(product_promotion_event::Column::PromotionEventId.eq(promotion_event_id))
            .one(self.transaction()?)
            .await;
        let link = self.settle(found.map_err(Error::from))?;
        match link {
            Some(link) => self.delete::<product_promotion_event::Model>(link.id).await,
            None => self.settle(Err(Error::LinkNotFound {
                entity: product_promotion_event::Model::ENTITY,
                product_id,
                promotion_event_id,
            })),
        }
    }

    /// Adds a line for `quantity` units of a product to an order.
    pub async fn add_order_line(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<order_product::Model> {
        self.create(order_product::Model::new(order_id, product_id, quantity))
            .await
    }

    /// Sets the stock on hand of a product, creating its stock record on first use.
    pub async fn set_stock(
        &mut self,
        product_id: i64,
        quantity: i32,
    ) -> Result<stock_management::Model> {
        let found = StockManagement::find()
            .filter(stock_management::Column::ProductId.eq(product_id))
            .one(self.transaction()?)
            .await;
        match self.settle(found.map_err(Error::from))? {
            Some(mut stock) => {
                stock.quantity = quantity;
                self.update(stock).await
            }
            None => {
                self.create(stock_management::Model::new(product_id, quantity))
                    .await
            }
        }
    }

    /// Lines of an order, as staged in this scope.
    pub async fn order_lines(&self, order_id: i64) -> Result<Vec<order_product::Model>> {
        Ok(OrderProduct::find()
            .filter(order_product::Column::OrderId.eq(order_id))
            .all(self.transaction()?)
            .await?)
    }

    /// Runs the deferred checks and commits. On any failure the transaction is rolled
    /// back and the error returned; nothing is committed.
    #[instrument(skip(self), fields(writes = self.writes))]
    pub async fn commit(mut self) -> Result<()> {
        match self.state {
            ScopeState::Open => {}
            ScopeState::Failing => {
                self.abort().await;
                return Err(Error::Transaction {
                    message: "unit of work failed earlier; rolled back instead of committing"
                        .to_string(),
                });
            }
            state => {
                return Err(Error::Transaction {
                    message: format!("cannot commit a unit of work that is {state}"),
                });
            }
        }

        if let Err(err) = self.check_deferred().await {
            warn!("deferred checks failed: {}", err);
            self.state = ScopeState::Failing;
            self.abort().await;
            return Err(err);
        }

        self.state = ScopeState::Committing;
        let Some(txn) = self.txn.take() else {
            self.state = ScopeState::Closed;
            return Err(Error::Transaction {
                message: "transaction already released".to_string(),
            });
        };
        let committed = txn.commit().await;
        self.state = ScopeState::Closed;
        match committed {
            Ok(()) => {
                info!("committed {} write(s)", self.writes);
                Ok(())
            }
            Err(err) => {
                error!("commit failed: {}", err);
                Err(Error::from_commit(err))
            }
        }
    }

    /// Discards every staged write.
    #[instrument(skip(self), fields(writes = self.writes))]
    pub async fn rollback(mut self) -> Result<()> {
        self.state = ScopeState::RollingBack;
        let Some(txn) = self.txn.take() else {
            self.state = ScopeState::Closed;
            return Ok(());
        };
        let result = txn.rollback().await;
        self.state = ScopeState::Closed;
        result.map_err(|e| Error::Transaction {
            message: format!("rollback failed: {e}"),
        })?;
        info!("rolled back {} write(s)", self.writes);
        Ok(())
    }

    async fn stage_create<M: Record>(&self, mut record: M) -> Result<M> {
        let txn = self.transaction()?;
        record.resolve_derived(txn).await?;
        M::hooks(&self.domain.hooks).apply(&mut record, &HookContext::insert(now()));
        self.domain.constraints.validate(&record)?;
        integrity::check_unique(txn, &self.domain.schema, &record).await?;
        integrity::check_references(txn, &self.domain.schema, &record).await?;
        record.insert_row(txn).await
    }

    async fn stage_update<M: Record>(&self, mut record: M) -> Result<(M, M)> {
        let txn = self.transaction()?;
        let previous = M::find_by_id(txn, record.id())
            .await?
            .ok_or(Error::NotFound {
                entity: M::ENTITY,
                id: record.id(),
            })?;
        record.resolve_derived(txn).await?;
        M::hooks(&self.domain.hooks).apply(&mut record, &HookContext::update(now()));
        self.domain.constraints.validate(&record)?;
        integrity::check_unique(txn, &self.domain.schema, &record).await?;
        integrity::check_references(txn, &self.domain.schema, &record).await?;
        integrity::check_acyclic(txn, &self.domain.schema, &record).await?;
        let updated = record.update_row(txn).await?;
        updated.propagate(txn).await?;
        Ok((previous, updated))
    }

    async fn stage_delete<M: Record>(&self, id: i64) -> Result<M> {
        let txn = self.transaction()?;
        let existing = M::find_by_id(txn, id).await?.ok_or(Error::NotFound {
            entity: M::ENTITY,
            id,
        })?;
        integrity::check_restrict::<M, _>(txn, &self.domain.schema, id).await?;
        M::delete_by_id(txn, id).await?;
        Ok(existing)
    }

    /// Poisons the scope if `result` is an error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if self.state == ScopeState::Open {
                warn!("mutation failed, unit of work can only roll back: {}", err);
                self.state = ScopeState::Failing;
            }
        }
        result
    }

    fn touch(&mut self, touch: Touch) {
        match touch {
            Touch::Nothing => {}
            Touch::Product(id) => {
                self.touched_products.insert(id);
            }
            Touch::PromotionEvent(id) => {
                self.touched_events.insert(id);
            }
        }
    }

    async fn check_deferred(&self) -> Result<()> {
        let txn = self.transaction()?;
        let mut products = self.touched_products.clone();
        for event_id in &self.touched_events {
            let links = ProductPromotionEvent::find()
                .filter(product_promotion_event::Column::PromotionEventId.eq(*event_id))
                .all(txn)
                .await?;
            products.extend(links.into_iter().map(|link| link.product_id));
        }

        for id in products {
            let Some(product) = product::Model::find_by_id(txn, id).await? else {
                continue;
            };
            let state = ProductState::load(txn, product).await?;
            self.domain.constraints.validate_product_state(&state)?;
        }
        Ok(())
    }

    async fn abort(&mut self) {
        self.state = ScopeState::RollingBack;
        if let Some(txn) = self.txn.take() {
            if let Err(err) = txn.rollback().await {
                error!("rollback failed: {}", err);
            }
        }
        self.state = ScopeState::Closed;
        info!("rolled back {} write(s)", self.writes);
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.txn.is_some() {
            warn!(
                "unit of work dropped while {}; rolling back {} write(s)",
                self.state, self.writes
            );
        }
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
