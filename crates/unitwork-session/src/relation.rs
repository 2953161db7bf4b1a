//! Relation resolution: expanding a base command into the commands needed
//! to keep related entities consistent.
//!
//! Reference counts are mutated eagerly while the command forest is built;
//! the commands themselves act on them conditionally at execution time.
//! The two phases must stay separate: the true count after all sibling
//! relations in the batch have been visited is only known once every
//! relation has been resolved.

use crate::Session;
use crate::heap::StateRef;
use std::rc::Rc;
use unitwork_core::{
    ChainCommand, Command, CommandRef, ConditionalCommand, EntityRef, EntitySchema, Error,
    NullCommand, RelationKind, RelationSchema, Result, Value,
};

/// One declared relation's contribution to a store operation.
pub trait Relation {
    /// The relation name, as declared in the schema.
    fn name(&self) -> &str;

    /// Compute the commands needed to reconcile the previously linked
    /// entity with the currently linked one.
    ///
    /// `store` is the parent's base command; relation kinds that write the
    /// link into the parent row inject context into it.
    fn queue_change(
        &self,
        parent: &EntityRef,
        state: &StateRef,
        related: Option<EntityRef>,
        store: &CommandRef,
    ) -> Result<CommandRef>;
}

/// Has-one: the related row carries the foreign key.
pub struct HasOneRelation {
    session: Session,
    schema: RelationSchema,
    parent_primary_key: String,
}

impl HasOneRelation {
    pub(crate) fn new(session: &Session, schema: RelationSchema, parent_primary_key: String) -> Self {
        Self {
            session: session.clone(),
            schema,
            parent_primary_key,
        }
    }

    /// Conditional delete of a previously linked entity, gated on its
    /// reference count reaching zero at execution time.
    fn unlink(&self, orig: &EntityRef) -> Result<CommandRef> {
        let orig_state =
            self.session
                .heap()
                .borrow()
                .get(orig)
                .ok_or_else(|| Error::UntrackedEntity {
                    role: orig.borrow().role().to_string(),
                })?;
        orig_state.del_ref();

        let previous = orig_state.status();
        let role = orig.borrow().role();
        let delete = self.session.mapper(role)?.queue_delete(orig)?;

        let gate = Rc::clone(&orig_state);
        let mut conditional = ConditionalCommand::new(delete, move || gate.ref_count() == 0);

        // A skipped delete leaves the entity live; undo the scheduling mark.
        let revert = Rc::clone(&orig_state);
        conditional.on_skip(move || revert.set_status(previous));

        tracing::trace!(
            relation = %self.schema.name,
            remaining = orig_state.ref_count(),
            "unlinking related entity"
        );
        Ok(Command::Conditional(conditional).into_ref())
    }

    /// The parent-side key value for the foreign key binding, if known.
    fn parent_key(&self, parent: &EntityRef, state: &StateRef) -> Option<Value> {
        if self.schema.inner_key == self.parent_primary_key {
            state.primary_key()
        } else {
            parent
                .borrow()
                .extract()
                .get(&self.schema.inner_key)
                .filter(|value| !value.is_null())
                .cloned()
        }
    }

    /// Bind the child command's foreign-key context to the parent's key:
    /// immediately when known, otherwise the moment the parent's generated
    /// key reaches its state.
    fn bind_foreign_key(&self, parent: &EntityRef, state: &StateRef, child: &CommandRef) {
        let outer_key = self.schema.outer_key.clone();
        match self.parent_key(parent, state) {
            Some(key) => child.borrow_mut().set_context(&outer_key, key),
            None => {
                child.borrow_mut().wait_context(&outer_key);
                let target = Rc::clone(child);
                state.on_update(move |s| {
                    if let Some(key) = s.primary_key() {
                        if let Ok(mut command) = target.try_borrow_mut() {
                            command.set_context(&outer_key, key);
                        }
                    }
                });
            }
        }
    }
}

impl Relation for HasOneRelation {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn queue_change(
        &self,
        parent: &EntityRef,
        state: &StateRef,
        related: Option<EntityRef>,
        _store: &CommandRef,
    ) -> Result<CommandRef> {
        let orig = state.relation(&self.schema.name);
        state.set_relation(&self.schema.name, related.clone());

        if !self.schema.cascade {
            // The caller manages the related entity explicitly.
            return Ok(Command::Null(NullCommand).into_ref());
        }

        let mut chain = ChainCommand::new();

        if let (Some(orig), None) = (&orig, &related) {
            return self.unlink(orig);
        }

        if let (Some(orig), Some(related)) = (&orig, &related) {
            if !Rc::ptr_eq(orig, related) {
                chain.add(self.unlink(orig)?);
            }
        }

        if let Some(related) = related {
            let tracked = self.session.heap().borrow().get(&related);
            if let Some(rel_state) = &tracked {
                rel_state.add_ref();
                if rel_state.ref_count() > self.schema.fan_in_limit {
                    tracing::trace!(
                        relation = %self.schema.name,
                        refs = rel_state.ref_count(),
                        "fan-in limit reached, suppressing re-store"
                    );
                    return Ok(Command::Null(NullCommand).into_ref());
                }
            }

            let role = related.borrow().role();
            let inner = self.session.mapper(role)?.queue_store(&related)?;

            if tracked.is_none() {
                // The delegated store attached the state; count the link
                // now so shared-ownership deletes behave the same for
                // first and later links.
                if let Some(rel_state) = self.session.heap().borrow().get(&related) {
                    rel_state.add_ref();
                }
            }

            self.bind_foreign_key(parent, state, &inner);
            chain.add_target(inner);
        }

        Ok(Command::Chain(chain).into_ref())
    }
}

/// All declared relations of one entity type.
pub struct RelationMap {
    relations: Vec<Box<dyn Relation>>,
}

impl RelationMap {
    /// Build the relation set for an entity schema.
    pub(crate) fn new(session: &Session, entity: &EntitySchema) -> Self {
        let relations = entity
            .relations
            .iter()
            .map(|schema| match schema.kind {
                RelationKind::HasOne => Box::new(HasOneRelation::new(
                    session,
                    schema.clone(),
                    entity.primary_key.clone(),
                )) as Box<dyn Relation>,
            })
            .collect();
        Self { relations }
    }

    /// Fold relation commands around the entity's base command.
    ///
    /// The base command stays the chain's target so outer completion
    /// bookkeeping and context injection reach it.
    pub(crate) fn queue_relations(
        &self,
        entity: &EntityRef,
        state: &StateRef,
        store: CommandRef,
    ) -> Result<CommandRef> {
        if self.relations.is_empty() {
            return Ok(store);
        }

        let mut chain = ChainCommand::new();
        chain.add_target(Rc::clone(&store));

        for relation in &self.relations {
            let related = entity.borrow().related(relation.name());
            chain.add(relation.queue_change(entity, state, related, &store)?);
        }

        Ok(Command::Chain(chain).into_ref())
    }
}
