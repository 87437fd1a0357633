//! Builder: turns a bound [`PhysicalPlan`] into an executor tree.

use crate::aggregate::AggregateExec;
use crate::distinct::DistinctExec;
use crate::dml::{DeleteExec, InsertExec};
use crate::filter::FilterExec;
use crate::join::NestedLoopJoinExec;
use crate::limit::LimitExec;
use crate::project::ProjectionExec;
use crate::scan::ScanExec;
use crate::sort::SortExec;
use crate::status::StatusExec;
use crate::Executor;
use common::DbResult;
use planner::PhysicalPlan;

pub fn build(plan: PhysicalPlan) -> DbResult<Box<dyn Executor>> {
    Ok(match plan {
        PhysicalPlan::Scan { table, schema, .. } => Box::new(ScanExec::new(table, schema)),
        PhysicalPlan::Filter { input, predicate, schema } => {
            Box::new(FilterExec::new(build(*input)?, predicate, schema))
        }
        PhysicalPlan::Projection { input, items, schema } => {
            Box::new(ProjectionExec::new(build(*input)?, items, schema))
        }
        PhysicalPlan::NestedLoopJoin { left, right, predicate, schema } => {
            Box::new(NestedLoopJoinExec::new(build(*left)?, build(*right)?, predicate, schema))
        }
        PhysicalPlan::Aggregate { input, group_by, aggregates, schema } => {
            Box::new(AggregateExec::new(build(*input)?, group_by, aggregates, schema))
        }
        PhysicalPlan::Distinct { input, schema } => Box::new(DistinctExec::new(build(*input)?, schema)),
        PhysicalPlan::Sort { input, keys, schema } => Box::new(SortExec::new(build(*input)?, keys, schema)),
        PhysicalPlan::Limit { input, limit, schema } => Box::new(LimitExec::new(build(*input)?, limit, schema)),
        PhysicalPlan::Insert { table, columns, source } => {
            Box::new(InsertExec::new(&table, &columns, source, status_schema())?)
        }
        PhysicalPlan::Delete { table, predicate, schema } => Box::new(DeleteExec::new(&table, predicate, schema)),
        PhysicalPlan::Status(message) => Box::new(StatusExec::new(message, status_schema())),
    })
}

/// `Insert`/`Status` both report a single human-readable message under a
/// column named `status`, matching `PhysicalPlan::schema()`'s convention for
/// those two variants.
fn status_schema() -> planner::Schema {
    vec![planner::ColumnIdentifier {
        name: "status".into(),
        qualifier: None,
        is_aggregate: false,
    }]
}
