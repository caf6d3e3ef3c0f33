use crate::{
    core::{
        columns::resolve_columns,
        config::GridConfig,
        executor::{RecordLookup, SqlExecutor},
        foreign::{resolve_foreign_display, SqlRecordLookup},
        identifier::Identifier,
        query::{build_count_query, build_page_query, PageSpec},
        rows::project_row,
        schema::SchemaIntrospector,
        types::{total_pages, GridRequest, GridResult, SortDirection},
    },
    error::{AppError, AppResult},
};

/// Builds one grid page for an arbitrary table.
///
/// All collaborators are handed in by the caller; nothing is cached between calls.
pub struct GridAssembler<'a, E: SqlExecutor + ?Sized, L: RecordLookup + ?Sized> {
    introspector: SchemaIntrospector<'a, E>,
    executor: &'a E,
    lookup: &'a L,
    config: &'a GridConfig,
}

impl<'a, E, L> GridAssembler<'a, E, L>
where
    E: SqlExecutor + ?Sized,
    L: RecordLookup + ?Sized,
{
    pub fn new(
        introspector: SchemaIntrospector<'a, E>,
        executor: &'a E,
        lookup: &'a L,
        config: &'a GridConfig,
    ) -> Self {
        Self {
            introspector,
            executor,
            lookup,
            config,
        }
    }

    pub fn get_grid_data(&self, req: &GridRequest) -> AppResult<GridResult> {
        let table = Identifier::parse(&req.table_name)?;
        if req.page_size == 0 {
            return Err(AppError::InvalidRequest("page size must be positive".into()));
        }
        let page = req.page.max(1);
        let sort_direction = SortDirection::parse_lenient(&req.sort_direction);
        let search_column = req
            .search_column
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        // Column names are checked before the catalog is read.
        let sort_field = req.sort_field.trim();
        if !sort_field.is_empty() {
            Identifier::parse(sort_field)?;
        }
        if let Some(c) = search_column {
            Identifier::parse(c)?;
        }

        let schema = self.introspector.describe(&table)?;
        if schema.columns.is_empty() {
            return Err(AppError::TableNotFound(table.to_string()));
        }
        let columns = resolve_columns(&schema, &self.config.pk_prefix);
        let pk_column = schema
            .primary_key_column(&self.config.pk_prefix)
            .map(|c| c.name.clone())
            .ok_or_else(|| AppError::TableNotFound(table.to_string()))?;

        let count_q = build_count_query(&schema, &req.search_term, search_column)?;
        let page_q = build_page_query(
            &schema,
            &PageSpec {
                page,
                page_size: req.page_size,
                search_term: &req.search_term,
                search_column,
                sort_field: &req.sort_field,
                sort_direction,
            },
        )?;

        let total_count = self.executor.count(&count_q)?;
        let raw = self.executor.query(&page_q)?;

        let mut rows = raw
            .rows
            .iter()
            .map(|r| project_row(table.as_str(), r, &columns, &pk_column))
            .collect::<AppResult<Vec<_>>>()?;

        resolve_foreign_display(&self.introspector, self.lookup, self.config, &columns, &mut rows)?;

        tracing::debug!(
            table = %table,
            page,
            page_size = req.page_size,
            total_count,
            rows = rows.len(),
            "grid assembled"
        );

        Ok(GridResult {
            columns,
            rows,
            current_page: page,
            page_size: req.page_size,
            total_count,
            total_pages: total_pages(total_count, req.page_size),
            search_term: req.search_term.clone(),
            search_column: search_column.map(str::to_string),
            sort_field: req.sort_field.trim().to_string(),
            sort_direction,
            table_name: table.to_string(),
        })
    }
}

/// Convenience wiring of a [`GridAssembler`] over a single executor.
pub fn get_grid_data<E: SqlExecutor + ?Sized>(
    exec: &E,
    config: &GridConfig,
    req: &GridRequest,
) -> AppResult<GridResult> {
    let lookup = SqlRecordLookup::new(exec, &config.pk_prefix);
    let introspector = SchemaIntrospector::new(exec, &config.pk_prefix);
    GridAssembler::new(introspector, exec, &lookup, config).get_grid_data(req)
}
