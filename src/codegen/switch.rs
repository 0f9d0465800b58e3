use hashbrown::HashMap;

use crate::{
    bound::{ClauseKind, Literal, SwitchClause},
    codegen::builder::FunctionBuilder,
    error::{LoweringError, Result, ice},
    ir::LabelId,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseTarget {
    pub label: LabelId,
    /// Index of the clause the case belongs to
    pub clause: usize,
    pub value: Literal,
}

/// Maps the textual key of every case constant of one switch statement to
/// the label of its clause
#[derive(Debug, Default)]
pub struct SwitchCaseMap {
    cases: Vec<CaseTarget>,
    keys: HashMap<String, usize>,
    default: Option<CaseTarget>,
}

impl SwitchCaseMap {
    /// Allocates one label per clause and records every case constant. No
    /// instruction is emitted. Returns the map and the clause labels in
    /// clause order.
    pub fn build(
        builder: &mut FunctionBuilder,
        clauses: &[SwitchClause],
    ) -> Result<(Self, Vec<LabelId>)> {
        let mut map = Self::default();
        let mut labels = Vec::with_capacity(clauses.len());

        for (clause, SwitchClause { kind, .. }) in clauses.iter().enumerate() {
            let label = builder.create_label();
            labels.push(label);

            match kind {
                ClauseKind::Case(values) => {
                    for value in values {
                        map.insert(CaseTarget {
                            label,
                            clause,
                            value: *value,
                        })?;
                    }
                }
                ClauseKind::Default => map.set_default(CaseTarget {
                    label,
                    clause,
                    value: Literal::Null,
                })?,
            }
        }

        Ok((map, labels))
    }

    pub fn insert(&mut self, target: CaseTarget) -> Result<()> {
        let key = target.value.key();

        if self.keys.contains_key(&key) {
            return Err(ice!(LoweringError::DuplicateCaseKey { key }));
        }

        self.keys.insert(key, self.cases.len());
        self.cases.push(target);
        Ok(())
    }

    pub fn set_default(&mut self, target: CaseTarget) -> Result<()> {
        if self.default.is_some() {
            return Err(ice!(LoweringError::DuplicateDefault));
        }

        self.default = Some(target);
        Ok(())
    }

    pub fn get(&self, value: &Literal) -> Result<&CaseTarget> {
        let key = value.key();

        self.keys
            .get(&key)
            .map(|index| &self.cases[*index])
            .ok_or_else(|| ice!(LoweringError::UnknownCaseKey { key }))
    }

    pub fn default_target(&self) -> Option<&CaseTarget> {
        self.default.as_ref()
    }

    /// Case targets in declaration order
    pub fn cases(&self) -> &[CaseTarget] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// State of a switch statement whose clauses are being lowered, consulted by
/// `goto case` and `goto default`
#[derive(Debug)]
pub struct SwitchContext {
    pub map: SwitchCaseMap,
    /// Cleanup depth at the switch statement. The clause compounds open
    /// their scopes from here.
    pub cleanup_depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::Compound;

    fn case(values: Vec<Literal>) -> SwitchClause {
        SwitchClause {
            kind: ClauseKind::Case(values),
            body: Compound::default(),
        }
    }

    #[test]
    fn every_clause_gets_one_label() {
        let mut builder = FunctionBuilder::new();
        let clauses = [
            case(vec![Literal::Signed(1), Literal::Signed(2)]),
            SwitchClause {
                kind: ClauseKind::Default,
                body: Compound::default(),
            },
        ];

        let (map, labels) = SwitchCaseMap::build(&mut builder, &clauses).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Literal::Signed(2)).unwrap().label, labels[0]);
        assert_eq!(map.default_target().map(|d| d.label), Some(labels[1]));
        assert!(builder.instructions().is_empty());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut builder = FunctionBuilder::new();
        let clauses = [case(vec![Literal::Signed(7)]), case(vec![Literal::Signed(7)])];

        let error = SwitchCaseMap::build(&mut builder, &clauses).unwrap_err();

        assert!(matches!(error, LoweringError::DuplicateCaseKey { key } if key == "7"));
    }

    #[test]
    fn unknown_keys_are_reported() {
        let map = SwitchCaseMap::default();

        assert!(matches!(
            map.get(&Literal::Char('x')),
            Err(LoweringError::UnknownCaseKey { .. })
        ));
    }
}
