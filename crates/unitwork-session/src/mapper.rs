//! Schema-driven mapping of entity store/delete requests to commands.
//!
//! The mapper's entire insert-vs-update decision is "does the heap know
//! this entity". It builds the base command for one entity, wires the
//! hooks that keep tracked state honest across commit and rollback, and
//! delegates to the relation resolver to fold in related-entity commands.

use crate::Session;
use crate::heap::{EntityState, StateRef, Status};
use crate::relation::RelationMap;
use std::rc::Rc;
use unitwork_core::{
    ColumnMap, Command, CommandRef, DeleteCommand, DriverRef, EntityRef, EntitySchema, Error,
    InsertCommand, Result, UpdateCommand, Value,
};

/// Maps one entity role's store/delete requests onto commands.
pub struct Mapper {
    session: Session,
    entity: EntitySchema,
    driver: DriverRef,
}

impl Mapper {
    pub(crate) fn new(session: &Session, role: &str) -> Result<Self> {
        let entity = session.schema().entity(role)?.clone();
        let driver = session.driver(&entity.database)?;
        Ok(Self {
            session: session.clone(),
            entity,
            driver,
        })
    }

    /// Queue a store of the given entity.
    ///
    /// Untracked entities take the insert path and become tracked; tracked
    /// ones take the update path. The returned command already folds in
    /// every declared relation.
    #[tracing::instrument(level = "debug", skip_all, fields(role = %self.entity.role))]
    pub fn queue_store(&self, entity: &EntityRef) -> Result<CommandRef> {
        let existing = self.session.heap().borrow().get(entity);

        let (command, state) = match existing {
            None => self.build_insert(entity)?,
            Some(state) => (self.build_update(entity, &state), state),
        };

        RelationMap::new(&self.session, &self.entity).queue_relations(entity, &state, command)
    }

    /// Queue a delete of the given entity.
    ///
    /// Deleting an untracked entity is a hard error.
    #[tracing::instrument(level = "debug", skip_all, fields(role = %self.entity.role))]
    pub fn queue_delete(&self, entity: &EntityRef) -> Result<CommandRef> {
        let state = self
            .session
            .heap()
            .borrow()
            .get(entity)
            .ok_or_else(|| Error::UntrackedEntity {
                role: self.entity.role.clone(),
            })?;

        Ok(self.build_delete(entity, &state))
    }

    /// Extract the entity's current values, restricted to schema columns.
    fn entity_columns(&self, entity: &EntityRef) -> ColumnMap {
        entity
            .borrow()
            .extract()
            .into_iter()
            .filter(|(column, _)| self.entity.has_column(column))
            .collect()
    }

    /// Key-wise inequality diff of current values against the snapshot,
    /// primary key excluded.
    fn diff(current: &ColumnMap, snapshot: &ColumnMap, primary_key: &str) -> ColumnMap {
        current
            .iter()
            .filter(|(column, value)| {
                column.as_str() != primary_key && snapshot.get(*column) != Some(value)
            })
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    fn known_key(&self, columns: &ColumnMap) -> Option<Value> {
        columns
            .get(&self.entity.primary_key)
            .filter(|value| !value.is_null())
            .cloned()
    }

    fn build_insert(&self, entity: &EntityRef) -> Result<(CommandRef, StateRef)> {
        let columns = self.entity_columns(entity);
        let state = EntityState::new(
            self.known_key(&columns),
            Status::ScheduledInsert,
            columns.clone(),
        );

        let mut insert_columns = columns;
        insert_columns.remove(&self.entity.primary_key);

        let mut insert = InsertCommand::new(
            Rc::clone(&self.driver),
            self.entity.table.clone(),
            insert_columns,
        );

        // Managed from this point on.
        self.session
            .heap()
            .borrow_mut()
            .attach(entity, Rc::clone(&state))?;

        let key_sink = Rc::clone(&state);
        insert.on_execute(move |key| key_sink.set_primary_key(key.clone()));

        let finish_state = Rc::clone(&state);
        let finish_entity = Rc::clone(entity);
        let primary_key = self.entity.primary_key.clone();
        insert.on_complete(move |key, context| {
            finish_state.set_status(Status::Loaded);
            if let Some(key) = key {
                let mut values = ColumnMap::new();
                values.insert(primary_key.clone(), key.clone());
                finish_entity.borrow_mut().hydrate(&values);
                finish_state.set_primary_key(key.clone());
                finish_state.merge_snapshot(&values);
            }
            if !context.is_empty() {
                finish_entity.borrow_mut().hydrate(context);
                finish_state.merge_snapshot(context);
            }
        });

        let heap = Rc::clone(self.session.heap());
        let tracked = Rc::clone(entity);
        insert.on_rollback(move || {
            heap.borrow_mut().detach(&tracked);
        });

        Ok((Command::Insert(insert).into_ref(), state))
    }

    fn build_update(&self, entity: &EntityRef, state: &StateRef) -> CommandRef {
        let current = self.entity_columns(entity);
        let changes = Self::diff(&current, &state.snapshot(), &self.entity.primary_key);
        let where_value = state.primary_key().or_else(|| self.known_key(&current));

        let mut update = UpdateCommand::new(
            Rc::clone(&self.driver),
            self.entity.table.clone(),
            changes,
            self.entity.primary_key.clone(),
            where_value,
        );

        let previous = state.status();
        state.set_status(Status::ScheduledUpdate);

        let finish_state = Rc::clone(state);
        let finish_entity = Rc::clone(entity);
        update.on_complete(move |_key, context| {
            finish_state.set_status(Status::Loaded);
            finish_state.merge_snapshot(&current);
            if !context.is_empty() {
                finish_entity.borrow_mut().hydrate(context);
                finish_state.merge_snapshot(context);
            }
        });

        let revert_state = Rc::clone(state);
        update.on_rollback(move || revert_state.set_status(previous));

        let command = Command::Update(update).into_ref();
        Self::follow_key(state, &command);
        command
    }

    fn build_delete(&self, entity: &EntityRef, state: &StateRef) -> CommandRef {
        let where_value = state
            .primary_key()
            .or_else(|| self.known_key(&self.entity_columns(entity)));

        let mut delete = DeleteCommand::new(
            Rc::clone(&self.driver),
            self.entity.table.clone(),
            self.entity.primary_key.clone(),
            where_value,
        );

        let previous = state.status();
        state.set_status(Status::ScheduledDelete);

        let heap = Rc::clone(self.session.heap());
        let tracked = Rc::clone(entity);
        delete.on_complete(move |_key, _context| {
            heap.borrow_mut().detach(&tracked);
        });

        let revert_state = Rc::clone(state);
        delete.on_rollback(move || revert_state.set_status(previous));

        let command = Command::Delete(delete).into_ref();
        Self::follow_key(state, &command);
        command
    }

    /// Keep the command's identifying predicate in sync with the state's
    /// primary key, which may only become known mid-transaction.
    ///
    /// `try_borrow_mut` so a notification arriving while the command itself
    /// is running its hooks is a harmless skip (the predicate no longer
    /// matters at that point).
    fn follow_key(state: &StateRef, command: &CommandRef) {
        let target = Rc::clone(command);
        state.on_update(move |s| {
            if let Some(key) = s.primary_key() {
                if let Ok(mut command) = target.try_borrow_mut() {
                    command.set_where(Some(key));
                }
            }
        });
    }
}
