mod prefetch;


use crate::{
    error::{EngineError, Error, ManagerError},
    hydrate::{Hydrated, RawResult, hydrate_records, rows_to_flat, rows_to_mappings, rows_to_tuples},
    model::{EntityKind, Registry},
    query::{QueryIr, expr::Assign, spec::QuerySpec},
    value::{Row, Value},
};
use std::future::Future;
use tracing::debug;

///
/// ExecuteEngine
///
/// The narrow capability the execution engine must provide: accept one IR,
/// return one raw result (any of the three shapes, including the
/// deduplicated-relation shape for batched relation reads). The compiler
/// and hydrator never inspect the engine beyond this method, and engine
/// failures propagate unchanged.
///

pub trait ExecuteEngine {
    fn execute(&self, ir: &QueryIr) -> impl Future<Output = Result<RawResult, EngineError>>;
}

impl<E: EntityKind> QuerySpec<E> {
    /// Execute and hydrate typed records, including join hydration and any
    /// prefetched relation paths.
    pub async fn fetch(&self, engine: &impl ExecuteEngine) -> Result<Vec<Hydrated<E>>, Error> {
        let registry = Registry::global();
        registry.ensure_finalized()?;

        let ir = self.to_ir();
        debug!(table = %ir.table, "executing select");
        let (rows, dedup) = engine.execute(&ir).await?.into_rows()?;
        let mut records =
            hydrate_records::<E>(rows, self.joins.specs(), dedup.as_ref(), registry)?;

        if !self.prefetch.is_empty() {
            prefetch::run_prefetch(&mut records, &self.prefetch, engine, registry).await?;
        }
        Ok(records)
    }

    /// Execute and return mapping rows; no relation hydration.
    pub async fn fetch_mappings(&self, engine: &impl ExecuteEngine) -> Result<Vec<Row>, Error> {
        let (rows, _) = engine.execute(&self.to_ir()).await?.into_rows()?;
        Ok(rows_to_mappings(rows, self.cols.as_deref()))
    }

    /// Execute and return tuple rows in selected-column order.
    pub async fn fetch_tuples(&self, engine: &impl ExecuteEngine) -> Result<Vec<Vec<Value>>, Error> {
        let (rows, _) = engine.execute(&self.to_ir()).await?.into_rows()?;
        Ok(rows_to_tuples(rows, self.cols.as_deref()))
    }

    /// Execute and return the single selected column's values.
    pub async fn fetch_flat(&self, engine: &impl ExecuteEngine) -> Result<Vec<Value>, Error> {
        let (rows, _) = engine.execute(&self.to_ir()).await?.into_rows()?;
        Ok(rows_to_flat(rows, self.cols.as_deref())?)
    }

    /// First record under the current ordering, or None.
    pub async fn first(&self, engine: &impl ExecuteEngine) -> Result<Option<Hydrated<E>>, Error> {
        let mut records = self.limit(1).fetch(engine).await?;
        Ok(records.drain(..).next())
    }

    /// Last record: flips the ordering (primary-key descending when none is
    /// set) and takes the first row.
    pub async fn last(&self, engine: &impl ExecuteEngine) -> Result<Option<Hydrated<E>>, Error> {
        let mut records = self.reversed().limit(1).fetch(engine).await?;
        Ok(records.drain(..).next())
    }

    /// Exactly one record, or a manager error either way.
    pub async fn get(&self, engine: &impl ExecuteEngine) -> Result<Hydrated<E>, Error> {
        let mut records = self.limit(2).fetch(engine).await?;
        match records.len() {
            0 => Err(ManagerError::NotFound.into()),
            1 => Ok(records.remove(0)),
            count => Err(ManagerError::MultipleRows { count }.into()),
        }
    }

    /// Existence probe; compiles to a limit-1 select flagged `exists`.
    pub async fn exists(&self, engine: &impl ExecuteEngine) -> Result<bool, Error> {
        let (rows, _) = engine.execute(&self.exists_ir()).await?.into_rows()?;
        Ok(first_cell(&rows).is_some_and(truthy))
    }

    /// Row count for the current filter.
    pub async fn count(&self, engine: &impl ExecuteEngine) -> Result<u64, Error> {
        let (rows, _) = engine.execute(&self.count_ir()).await?.into_rows()?;
        Ok(scalar_count(&rows))
    }

    /// Execute an update; assignment values may embed expression trees.
    /// Returns the affected-row count reported by the engine.
    pub async fn update(
        &self,
        engine: &impl ExecuteEngine,
        assigns: impl IntoIterator<Item = (String, Assign)>,
    ) -> Result<u64, Error> {
        let ir = self.update_ir(assigns)?;
        debug!(table = %ir.table, "executing update");
        let (rows, _) = engine.execute(&ir).await?.into_rows()?;
        Ok(scalar_count(&rows))
    }

    /// Execute a delete for the current filter. Returns the affected-row
    /// count reported by the engine.
    pub async fn delete(&self, engine: &impl ExecuteEngine) -> Result<u64, Error> {
        let ir = self.delete_ir();
        debug!(table = %ir.table, "executing delete");
        let (rows, _) = engine.execute(&ir).await?.into_rows()?;
        Ok(scalar_count(&rows))
    }
}

/// First value of the first row, for single-cell engine replies.
fn first_cell(rows: &[Row]) -> Option<&Value> {
    rows.first().and_then(|row| row.values().next())
}

/// Non-negative count from a single-cell reply; anything else reads as 0.
fn scalar_count(rows: &[Row]) -> u64 {
    first_cell(rows)
        .and_then(Value::as_int)
        .map_or(0, |n| u64::try_from(n).unwrap_or(0))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        _ => false,
    }
}
