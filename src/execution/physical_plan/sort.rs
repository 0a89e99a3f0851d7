use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageId};
use crate::catalog::SchemaRef;
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::codec::SortPageCodec;
use crate::storage::page::{RecordId, SortPage, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::PhysicalPlan;

#[derive(Debug, Clone)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self { expr, asc: true }
    }

    pub fn desc(expr: Expr) -> Self {
        Self { expr, asc: false }
    }
}

/// A chain of sorted pages produced during external merge sort. Tuples are
/// ordered within each page and across the chain.
#[derive(Debug, Clone)]
pub struct MergeSortRun {
    pages: Vec<PageId>,
    buffer_pool: Arc<BufferPoolManager>,
    schema: SchemaRef,
}

impl MergeSortRun {
    pub fn new(pages: Vec<PageId>, buffer_pool: Arc<BufferPoolManager>, schema: SchemaRef) -> Self {
        Self {
            pages,
            buffer_pool,
            schema,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_id(&self, index: usize) -> PageId {
        self.pages[index]
    }

    fn load_page(&self, index: usize) -> BrambleResult<SortPage> {
        let guard = self.buffer_pool.fetch_page_read(self.pages[index])?;
        let (page, _) = SortPageCodec::decode(guard.data(), self.schema.clone())?;
        Ok(page)
    }

    pub fn iter(&self) -> RunIterator {
        RunIterator {
            run: self.clone(),
            page_index: 0,
            tuple_index: 0,
            current_page: None,
            exhausted: false,
        }
    }

    fn delete_pages(&self) -> BrambleResult<()> {
        for page_id in self.pages.iter() {
            self.buffer_pool.delete_page(*page_id)?;
        }
        Ok(())
    }
}

/// Streams the tuples of one run by `(page_index, tuple_index)`.
#[derive(Debug)]
pub struct RunIterator {
    run: MergeSortRun,
    page_index: usize,
    tuple_index: usize,
    current_page: Option<SortPage>,
    exhausted: bool,
}

impl RunIterator {
    pub fn next(&mut self) -> BrambleResult<Option<Tuple>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            if self.current_page.is_none() {
                if self.page_index >= self.run.page_count() {
                    self.exhausted = true;
                    return Ok(None);
                }
                self.current_page = Some(self.run.load_page(self.page_index)?);
            }
            let page = self.current_page.as_ref().unwrap();
            if self.tuple_index < page.tuple_count() {
                let tuple = page.tuple_at(self.tuple_index)?.clone();
                self.tuple_index += 1;
                return Ok(Some(tuple));
            }
            self.page_index += 1;
            self.tuple_index = 0;
            self.current_page = None;
        }
    }
}

#[derive(Default)]
struct SortState {
    iterator: Option<RunIterator>,
}

/// External merge sort: the child is drained into one-page sorted runs, runs
/// are merged two at a time until one remains, and the final run streams out
/// of `next`. Intermediate pages live in the buffer pool and are deleted as
/// their run is consumed.
#[derive(Debug)]
pub struct PhysicalExternalMergeSort {
    pub input: Arc<PhysicalPlan>,
    pub order_bys: Vec<OrderByExpr>,

    state: Mutex<SortState>,
}

impl PhysicalExternalMergeSort {
    pub fn new(input: Arc<PhysicalPlan>, order_bys: Vec<OrderByExpr>) -> Self {
        PhysicalExternalMergeSort {
            input,
            order_bys,
            state: Mutex::new(SortState::default()),
        }
    }

    fn sort_key(&self, context: &ExecutionContext, tuple: &Tuple) -> BrambleResult<Vec<ScalarValue>> {
        self.order_bys
            .iter()
            .map(|order_by| context.eval_expr(&order_by.expr, tuple))
            .collect()
    }

    fn compare_keys(&self, a: &[ScalarValue], b: &[ScalarValue]) -> Ordering {
        for (order_by, (left, right)) in self.order_bys.iter().zip(a.iter().zip(b.iter())) {
            let mut order = left.partial_cmp(right).unwrap_or(Ordering::Equal);
            if !order_by.asc {
                order = order.reverse();
            }
            if order != Ordering::Equal {
                return order;
            }
        }
        Ordering::Equal
    }

    fn write_sort_page(
        &self,
        buffer_pool: &Arc<BufferPoolManager>,
        page: &SortPage,
    ) -> BrambleResult<PageId> {
        let mut guard = buffer_pool.new_page()?;
        guard.overwrite(&SortPageCodec::encode(page));
        Ok(guard.page_id())
    }

    /// Phase 1: pack child tuples into sort pages; each page is sorted in
    /// memory and becomes a single-page run.
    fn create_initial_runs(
        &self,
        context: &mut ExecutionContext,
        buffer_pool: &Arc<BufferPoolManager>,
        schema: &SchemaRef,
    ) -> BrambleResult<Vec<MergeSortRun>> {
        let mut runs = Vec::new();
        let mut current = SortPage::try_new(schema.clone())?;

        while let Some((tuple, _)) = self.input.next(context)? {
            if current.is_full() {
                self.sort_page_tuples(context, &mut current)?;
                let page_id = self.write_sort_page(buffer_pool, &current)?;
                runs.push(MergeSortRun::new(
                    vec![page_id],
                    buffer_pool.clone(),
                    schema.clone(),
                ));
                current = SortPage::try_new(schema.clone())?;
            }
            current.insert_tuple(tuple);
        }

        if current.tuple_count() > 0 {
            self.sort_page_tuples(context, &mut current)?;
            let page_id = self.write_sort_page(buffer_pool, &current)?;
            runs.push(MergeSortRun::new(
                vec![page_id],
                buffer_pool.clone(),
                schema.clone(),
            ));
        }
        Ok(runs)
    }

    fn sort_page_tuples(
        &self,
        context: &ExecutionContext,
        page: &mut SortPage,
    ) -> BrambleResult<()> {
        let mut entries = Vec::with_capacity(page.tuples.len());
        for tuple in page.tuples.drain(..) {
            let key = self.sort_key(context, &tuple)?;
            entries.push((key, tuple));
        }
        entries.sort_by(|a, b| self.compare_keys(&a.0, &b.0));
        page.tuples = entries.into_iter().map(|(_, tuple)| tuple).collect();
        Ok(())
    }

    /// Phase 2 step: merge runs pairwise; consumed input pages are deleted.
    fn merge_pass(
        &self,
        context: &ExecutionContext,
        buffer_pool: &Arc<BufferPoolManager>,
        schema: &SchemaRef,
        input_runs: Vec<MergeSortRun>,
    ) -> BrambleResult<Vec<MergeSortRun>> {
        let mut output_runs = Vec::with_capacity(input_runs.len() / 2 + 1);
        let mut iter = input_runs.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => {
                    let merged = self.merge_two_runs(context, buffer_pool, schema, &first, &second)?;
                    first.delete_pages()?;
                    second.delete_pages()?;
                    output_runs.push(merged);
                }
                // Odd run passes through untouched.
                None => output_runs.push(first),
            }
        }
        Ok(output_runs)
    }

    fn merge_two_runs(
        &self,
        context: &ExecutionContext,
        buffer_pool: &Arc<BufferPoolManager>,
        schema: &SchemaRef,
        first: &MergeSortRun,
        second: &MergeSortRun,
    ) -> BrambleResult<MergeSortRun> {
        let mut output_pages = Vec::new();
        let mut output_page = SortPage::try_new(schema.clone())?;

        let mut iter1 = first.iter();
        let mut iter2 = second.iter();
        let mut head1 = iter1.next()?;
        let mut head2 = iter2.next()?;

        let mut emit = |page: &mut SortPage, tuple: Tuple| -> BrambleResult<()> {
            if page.is_full() {
                output_pages.push(self.write_sort_page(buffer_pool, page)?);
                *page = SortPage::try_new(schema.clone())?;
            }
            page.insert_tuple(tuple);
            Ok(())
        };

        loop {
            match (head1.take(), head2.take()) {
                (Some(t1), Some(t2)) => {
                    let key1 = self.sort_key(context, &t1)?;
                    let key2 = self.sort_key(context, &t2)?;
                    if self.compare_keys(&key1, &key2) != Ordering::Greater {
                        emit(&mut output_page, t1)?;
                        head1 = iter1.next()?;
                        head2 = Some(t2);
                    } else {
                        emit(&mut output_page, t2)?;
                        head1 = Some(t1);
                        head2 = iter2.next()?;
                    }
                }
                (Some(t1), None) => {
                    emit(&mut output_page, t1)?;
                    head1 = iter1.next()?;
                }
                (None, Some(t2)) => {
                    emit(&mut output_page, t2)?;
                    head2 = iter2.next()?;
                }
                (None, None) => break,
            }
        }
        drop(emit);

        if output_page.tuple_count() > 0 {
            output_pages.push(self.write_sort_page(buffer_pool, &output_page)?);
        }
        Ok(MergeSortRun::new(
            output_pages,
            buffer_pool.clone(),
            schema.clone(),
        ))
    }
}

impl VolcanoExecutor for PhysicalExternalMergeSort {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        let schema = self.input.output_schema();
        let buffer_pool = context.catalog.buffer_pool().clone();

        let mut runs = self.create_initial_runs(context, &buffer_pool, &schema)?;
        while runs.len() > 1 {
            runs = self.merge_pass(context, &buffer_pool, &schema, runs)?;
        }

        let mut state = self.state.lock();
        state.iterator = runs.pop().map(|run| run.iter());
        Ok(())
    }

    fn next(&self, _context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut state = self.state.lock();
        let Some(iterator) = state.iterator.as_mut() else {
            return Ok(None);
        };
        match iterator.next()? {
            // The sort breaks the tie to the base table, so no rid survives.
            Some(tuple) => Ok(Some((tuple, INVALID_RID))),
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.input.output_schema()
    }
}

impl std::fmt::Display for PhysicalExternalMergeSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExternalMergeSort({} keys)", self.order_bys.len())
    }
}

impl std::fmt::Debug for SortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortState")
            .field("has_final_run", &self.iterator.is_some())
            .finish()
    }
}
