//! Interfaces: a structural type alias and no runtime code.

use crate::error::LoweringResult;
use crate::lowerer::Lowerer;
use crate::metadata::{LayoutStrategy, TypeMetadata};
use luma_source::TypeDecl;
use luma_target::{Stmt as TStmt, TypeNode};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

impl<'a> Lowerer<'a> {
    pub(super) fn lower_interface(
        &mut self,
        decl: &TypeDecl,
        meta: &TypeMetadata,
    ) -> LoweringResult<Vec<TStmt>> {
        if !self.options.emit_type_annotations {
            return Ok(Vec::new());
        }
        let self_type = TypeNode::generic(
            decl.name.clone(),
            decl.type_parameters
                .iter()
                .map(|param| TypeNode::named(param.clone()))
                .collect(),
        );
        let mut fields = self.structural_fields(&decl.members, meta, &self_type);
        let mut seen: FxHashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
        for inherited in self.inherited_interfaces(meta) {
            for field in self.structural_fields(&inherited.interface_members, inherited, &self_type) {
                if seen.insert(field.name.clone()) {
                    fields.push(field);
                }
            }
        }
        Ok(self.type_alias(decl, TypeNode::Table(fields)).into_iter().collect())
    }

    /// Interfaces `meta` extends, directly or transitively and from any
    /// file, in first-reached order.
    fn inherited_interfaces(&self, meta: &TypeMetadata) -> Vec<&'a TypeMetadata> {
        let metadata = self.metadata;
        let mut found = Vec::new();
        let mut queue: VecDeque<&str> = meta.interfaces.iter().map(String::as_str).collect();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        visited.insert(meta.full_name.as_str());
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            let Some(parent) = metadata.get(name) else {
                continue;
            };
            if parent.strategy != LayoutStrategy::Interface {
                continue;
            }
            queue.extend(parent.interfaces.iter().map(String::as_str));
            found.push(parent);
        }
        found
    }
}
