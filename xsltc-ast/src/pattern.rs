use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use xsltc_name::Name;

/// A compiled match pattern, generic over the compiled-expression type of
/// the predicates it carries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Pattern<E> {
    /// `/` — the document node.
    Root,
    /// One axis step with its trailing predicates: `chapter[2]`, `@id`,
    /// `text()`.
    Step {
        step: Step,
        predicates: Vec<E>,
    },
    /// `A/B` (direct) or `A//B`: the step pattern anchored below an
    /// ancestor pattern.
    Path {
        parent: Box<Pattern<E>>,
        /// true for `/` (parent), false for `//` (any ancestor)
        direct: bool,
        step: Box<Pattern<E>>,
    },
    Union(Vec<Pattern<E>>),
    Intersect {
        left: Box<Pattern<E>>,
        right: Box<Pattern<E>>,
    },
    Except {
        left: Box<Pattern<E>>,
        right: Box<Pattern<E>>,
    },
    /// A pattern rooted in one of the permitted functions: `key('k', 42)`,
    /// `id('a')`, `doc('u')`, `element-with-id('a')`, `root()`.
    Rooted {
        call: RootCall,
        predicates: Vec<E>,
    },
    /// `$var` as a pattern root.
    Variable {
        name: Name,
        predicates: Vec<E>,
    },
    /// `.[pred]` — matches atomic values and nodes by predicate alone.
    AtomicValue {
        predicates: Vec<E>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Axis {
    Child,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NameTest {
    /// An exact expanded name.
    Name(Name),
    /// `*`
    Star,
    /// `prefix:*`, held as the resolved URI.
    NamespaceStar(String),
    /// `*:local`
    LocalStar(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum KindTest {
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
    Element(ElementTest),
    Attribute(ElementTest),
    SchemaElement(Name),
    SchemaAttribute(Name),
    Document(Option<Box<KindTest>>),
}

/// The interior of `element(…)` / `attribute(…)`: an optional name and an
/// optional type annotation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElementTest {
    pub name: Option<Name>,
    pub type_name: Option<Name>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RootCall {
    pub function: RootFunction,
    pub args: Vec<RootArgument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RootFunction {
    Id,
    Key,
    Doc,
    ElementWithId,
    Root,
}

/// Arguments of a root function are restricted to literals and variable
/// references.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RootArgument {
    StringLiteral(String),
    NumberLiteral(Decimal),
    Variable(Name),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// Everything pattern matching needs from the host: node navigation and
/// the evaluation of compiled predicate expressions. Matching is a pure
/// function of the node, the context's variable bindings and the node's
/// document.
pub trait PatternContext<E> {
    type Node: Copy + Eq;
    type Value;

    fn kind(&self, node: Self::Node) -> NodeKind;
    fn name(&self, node: Self::Node) -> Option<Name>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn document_element(&self, node: Self::Node) -> Option<Self::Node>;

    /// Conjunction of the predicates against a candidate node.
    fn predicates_hold(&self, predicates: &[E], node: Self::Node) -> bool;
    /// Evaluate a root function call to its node set.
    fn root_nodes(&self, call: &RootCall) -> Vec<Self::Node>;
    /// The nodes bound to a pattern variable.
    fn variable_nodes(&self, name: &Name) -> Vec<Self::Node>;
    /// Conjunction of the predicates against an atomic value.
    fn predicates_hold_atomic(&self, predicates: &[E], value: &Self::Value) -> bool;
}

impl<E> Pattern<E> {
    pub fn matches<C: PatternContext<E>>(&self, node: C::Node, ctx: &C) -> bool {
        match self {
            Pattern::Root => ctx.kind(node) == NodeKind::Document,
            Pattern::Step { step, predicates } => {
                step.matches::<E, C>(node, ctx) && ctx.predicates_hold(predicates, node)
            }
            Pattern::Path {
                parent,
                direct,
                step,
            } => {
                if !step.matches(node, ctx) {
                    return false;
                }
                if *direct {
                    match ctx.parent(node) {
                        Some(p) => parent.matches(p, ctx),
                        None => false,
                    }
                } else {
                    let mut current = ctx.parent(node);
                    while let Some(ancestor) = current {
                        if parent.matches(ancestor, ctx) {
                            return true;
                        }
                        current = ctx.parent(ancestor);
                    }
                    false
                }
            }
            Pattern::Union(branches) => branches.iter().any(|p| p.matches(node, ctx)),
            Pattern::Intersect { left, right } => {
                left.matches(node, ctx) && right.matches(node, ctx)
            }
            Pattern::Except { left, right } => {
                left.matches(node, ctx) && !right.matches(node, ctx)
            }
            Pattern::Rooted { call, predicates } => {
                ctx.root_nodes(call).contains(&node) && ctx.predicates_hold(predicates, node)
            }
            Pattern::Variable { name, predicates } => {
                ctx.variable_nodes(name).contains(&node)
                    && ctx.predicates_hold(predicates, node)
            }
            Pattern::AtomicValue { predicates } => ctx.predicates_hold(predicates, node),
        }
    }

    pub fn matches_atomic<C: PatternContext<E>>(&self, value: &C::Value, ctx: &C) -> bool {
        match self {
            Pattern::AtomicValue { predicates } => ctx.predicates_hold_atomic(predicates, value),
            Pattern::Union(branches) => branches.iter().any(|p| p.matches_atomic(value, ctx)),
            _ => false,
        }
    }

    /// The top-level union branches; a non-union pattern is its own single
    /// branch. Each branch of a match pattern is registered as its own
    /// template rule.
    pub fn into_branches(self) -> Vec<Pattern<E>> {
        match self {
            Pattern::Union(branches) => branches
                .into_iter()
                .flat_map(Pattern::into_branches)
                .collect(),
            other => vec![other],
        }
    }

    /// The default priority of the pattern. A union takes the maximum over
    /// its branches; callers that expand unions ask each branch instead.
    pub fn default_priority(&self) -> Decimal {
        let half = Decimal::new(5, 1);
        match self {
            Pattern::Root => half,
            Pattern::Step { step, predicates } => {
                if predicates.is_empty() {
                    step.default_priority()
                } else {
                    half
                }
            }
            Pattern::Path { .. } => half,
            Pattern::Union(branches) => branches
                .iter()
                .map(|p| p.default_priority())
                .max()
                .unwrap_or(half),
            Pattern::Intersect { left, .. } | Pattern::Except { left, .. } => {
                left.default_priority()
            }
            Pattern::Rooted { .. } | Pattern::Variable { .. } => half,
            Pattern::AtomicValue { predicates } => {
                if predicates.is_empty() {
                    Decimal::new(-1, 0)
                } else {
                    Decimal::new(1, 0)
                }
            }
        }
    }

    pub fn default_priority_f64(&self) -> f64 {
        self.default_priority().to_f64().unwrap_or(0.5)
    }
}

impl Step {
    fn matches<E, C: PatternContext<E>>(&self, node: C::Node, ctx: &C) -> bool {
        let kind = ctx.kind(node);
        match &self.test {
            NodeTest::Name(test) => {
                let principal = match self.axis {
                    Axis::Child => NodeKind::Element,
                    Axis::Attribute => NodeKind::Attribute,
                };
                if kind != principal {
                    return false;
                }
                match ctx.name(node) {
                    Some(name) => test.matches(&name),
                    None => false,
                }
            }
            NodeTest::Kind(test) => {
                if self.axis == Axis::Attribute
                    && !matches!(test, KindTest::Node | KindTest::Attribute(_))
                {
                    return false;
                }
                test.matches::<E, C>(node, ctx)
            }
        }
    }

    fn default_priority(&self) -> Decimal {
        match &self.test {
            NodeTest::Name(NameTest::Name(_)) => Decimal::ZERO,
            NodeTest::Name(NameTest::NamespaceStar(_) | NameTest::LocalStar(_)) => {
                Decimal::new(-25, 2)
            }
            NodeTest::Name(NameTest::Star) => Decimal::new(-5, 1),
            NodeTest::Kind(test) => test.default_priority(),
        }
    }
}

impl ElementTest {
    /// Structural name matching; type annotations are the runtime's
    /// concern and are not tested here.
    fn matches_name<E, C: PatternContext<E>>(&self, node: C::Node, ctx: &C) -> bool {
        match &self.name {
            Some(name) => ctx.name(node).is_some_and(|actual| &actual == name),
            None => true,
        }
    }
}

impl NameTest {
    pub fn matches(&self, name: &Name) -> bool {
        match self {
            NameTest::Name(expected) => expected == name,
            NameTest::Star => true,
            NameTest::NamespaceStar(uri) => name.namespace() == Some(uri.as_str()),
            NameTest::LocalStar(local) => name.local() == local,
        }
    }
}

impl KindTest {
    fn matches<E, C: PatternContext<E>>(&self, node: C::Node, ctx: &C) -> bool {
        let kind = ctx.kind(node);
        match self {
            KindTest::Node => true,
            KindTest::Text => kind == NodeKind::Text,
            KindTest::Comment => kind == NodeKind::Comment,
            KindTest::ProcessingInstruction(target) => {
                kind == NodeKind::ProcessingInstruction
                    && match target {
                        Some(target) => {
                            ctx.name(node).is_some_and(|name| name.local() == target)
                        }
                        None => true,
                    }
            }
            KindTest::Element(test) => {
                kind == NodeKind::Element && test.matches_name::<E, C>(node, ctx)
            }
            KindTest::Attribute(test) => {
                kind == NodeKind::Attribute && test.matches_name::<E, C>(node, ctx)
            }
            KindTest::SchemaElement(name) => {
                kind == NodeKind::Element
                    && ctx.name(node).is_some_and(|actual| &actual == name)
            }
            KindTest::SchemaAttribute(name) => {
                kind == NodeKind::Attribute
                    && ctx.name(node).is_some_and(|actual| &actual == name)
            }
            KindTest::Document(inner) => {
                if kind != NodeKind::Document {
                    return false;
                }
                match inner {
                    Some(inner) => match ctx.document_element(node) {
                        Some(root) => inner.matches::<E, C>(root, ctx),
                        None => false,
                    },
                    None => true,
                }
            }
        }
    }

    fn default_priority(&self) -> Decimal {
        match self {
            KindTest::Element(test) | KindTest::Attribute(test) => match (&test.name, &test.type_name) {
                (Some(_), Some(_)) => Decimal::new(25, 2),
                (Some(_), None) => Decimal::ZERO,
                (None, Some(_)) => Decimal::ZERO,
                (None, None) => Decimal::new(-5, 1),
            },
            KindTest::SchemaElement(_) | KindTest::SchemaAttribute(_) => Decimal::new(25, 2),
            KindTest::ProcessingInstruction(target) => {
                if target.is_some() {
                    Decimal::ZERO
                } else {
                    Decimal::new(-5, 1)
                }
            }
            KindTest::Document(inner) => match inner {
                Some(inner) => inner.default_priority(),
                None => Decimal::new(-5, 1),
            },
            KindTest::Node | KindTest::Text | KindTest::Comment => Decimal::new(-5, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn name(local: &str) -> Name {
        Name::unprefixed(local)
    }

    fn name_step<E>(local: &str) -> Pattern<E> {
        Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Name(NameTest::Name(name(local))),
            },
            predicates: vec![],
        }
    }

    // a parent-linked toy tree, one node per row
    struct Model {
        nodes: Vec<(NodeKind, Option<Name>, Option<usize>)>,
        keyed: Vec<usize>,
    }

    impl PatternContext<String> for Model {
        type Node = usize;
        type Value = String;

        fn kind(&self, node: usize) -> NodeKind {
            self.nodes[node].0
        }

        fn name(&self, node: usize) -> Option<Name> {
            self.nodes[node].1.clone()
        }

        fn parent(&self, node: usize) -> Option<usize> {
            self.nodes[node].2
        }

        fn document_element(&self, node: usize) -> Option<usize> {
            self.nodes
                .iter()
                .position(|(kind, _, parent)| *kind == NodeKind::Element && *parent == Some(node))
        }

        fn predicates_hold(&self, predicates: &[String], _node: usize) -> bool {
            predicates.iter().all(|p| p == "true()")
        }

        fn root_nodes(&self, _call: &RootCall) -> Vec<usize> {
            self.keyed.clone()
        }

        fn variable_nodes(&self, _name: &Name) -> Vec<usize> {
            self.keyed.clone()
        }

        fn predicates_hold_atomic(&self, predicates: &[String], value: &String) -> bool {
            predicates.iter().all(|p| p == value)
        }
    }

    // document(0) > doc(1) > chapter(2) > title(3), chapter has @id(4)
    fn model() -> Model {
        Model {
            nodes: vec![
                (NodeKind::Document, None, None),
                (NodeKind::Element, Some(name("doc")), Some(0)),
                (NodeKind::Element, Some(name("chapter")), Some(1)),
                (NodeKind::Element, Some(name("title")), Some(2)),
                (NodeKind::Attribute, Some(name("id")), Some(2)),
            ],
            keyed: vec![2],
        }
    }

    #[test]
    fn test_root_matches_document_only() {
        let model = model();
        let pattern: Pattern<String> = Pattern::Root;
        assert!(pattern.matches(0, &model));
        assert!(!pattern.matches(1, &model));
    }

    #[test]
    fn test_name_test() {
        let model = model();
        let pattern = name_step::<String>("chapter");
        assert!(pattern.matches(2, &model));
        assert!(!pattern.matches(3, &model));
        // elements only; the attribute named id does not match child::id
        assert!(!name_step::<String>("id").matches(4, &model));
    }

    #[test]
    fn test_attribute_step() {
        let model = model();
        let pattern: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Attribute,
                test: NodeTest::Name(NameTest::Name(name("id"))),
            },
            predicates: vec![],
        };
        assert!(pattern.matches(4, &model));
        assert!(!pattern.matches(2, &model));
    }

    #[test]
    fn test_direct_path() {
        let model = model();
        let pattern = Pattern::Path {
            parent: Box::new(name_step::<String>("chapter")),
            direct: true,
            step: Box::new(name_step("title")),
        };
        assert!(pattern.matches(3, &model));
        assert!(!pattern.matches(2, &model));
    }

    #[test]
    fn test_ancestor_path() {
        let model = model();
        let pattern = Pattern::Path {
            parent: Box::new(name_step::<String>("doc")),
            direct: false,
            step: Box::new(name_step("title")),
        };
        assert!(pattern.matches(3, &model));
        let direct = Pattern::Path {
            parent: Box::new(name_step::<String>("doc")),
            direct: true,
            step: Box::new(name_step("title")),
        };
        assert!(!direct.matches(3, &model));
    }

    #[test]
    fn test_union_and_except() {
        let model = model();
        let union = Pattern::Union(vec![
            name_step::<String>("chapter"),
            name_step("title"),
        ]);
        assert!(union.matches(2, &model));
        assert!(union.matches(3, &model));

        let except = Pattern::Except {
            left: Box::new(Pattern::Step {
                step: Step {
                    axis: Axis::Child,
                    test: NodeTest::Name(NameTest::Star),
                },
                predicates: vec![],
            }),
            right: Box::new(name_step::<String>("chapter")),
        };
        assert!(except.matches(3, &model));
        assert!(!except.matches(2, &model));
    }

    #[test]
    fn test_rooted_pattern() {
        let model = model();
        let pattern: Pattern<String> = Pattern::Rooted {
            call: RootCall {
                function: RootFunction::Key,
                args: vec![
                    RootArgument::StringLiteral("k".to_string()),
                    RootArgument::StringLiteral("v".to_string()),
                ],
            },
            predicates: vec![],
        };
        assert!(pattern.matches(2, &model));
        assert!(!pattern.matches(3, &model));
    }

    #[test]
    fn test_predicates_gate_matching() {
        let model = model();
        let pattern: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Name(NameTest::Name(name("chapter"))),
            },
            predicates: vec!["false()".to_string()],
        };
        assert!(!pattern.matches(2, &model));
    }

    #[test]
    fn test_matches_atomic() {
        let model = model();
        let pattern: Pattern<String> = Pattern::AtomicValue {
            predicates: vec!["42".to_string()],
        };
        assert!(pattern.matches_atomic(&"42".to_string(), &model));
        assert!(!pattern.matches_atomic(&"41".to_string(), &model));
        assert!(!name_step::<String>("chapter").matches_atomic(&"42".to_string(), &model));
    }

    #[test]
    fn test_default_priorities() {
        let star: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Name(NameTest::Star),
            },
            predicates: vec![],
        };
        assert_eq!(star.default_priority(), dec!(-0.5));

        let ns_star: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Name(NameTest::NamespaceStar("http://example.com".into())),
            },
            predicates: vec![],
        };
        assert_eq!(ns_star.default_priority(), dec!(-0.25));

        assert_eq!(name_step::<String>("a").default_priority(), dec!(0));

        let with_predicate: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Name(NameTest::Name(name("a"))),
            },
            predicates: vec!["1".to_string()],
        };
        assert_eq!(with_predicate.default_priority(), dec!(0.5));

        let kind: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Kind(KindTest::Text),
            },
            predicates: vec![],
        };
        assert_eq!(kind.default_priority(), dec!(-0.5));

        let named_element: Pattern<String> = Pattern::Step {
            step: Step {
                axis: Axis::Child,
                test: NodeTest::Kind(KindTest::Element(ElementTest {
                    name: Some(name("a")),
                    type_name: None,
                })),
            },
            predicates: vec![],
        };
        assert_eq!(named_element.default_priority(), dec!(0));
    }

    #[test]
    fn test_union_priority_is_max_and_branches_split() {
        let union: Pattern<String> = Pattern::Union(vec![
            name_step("chapter"),
            Pattern::Step {
                step: Step {
                    axis: Axis::Child,
                    test: NodeTest::Name(NameTest::Name(name("appendix"))),
                },
                predicates: vec!["2".to_string()],
            },
        ]);
        assert_eq!(union.default_priority(), dec!(0.5));

        let branches = union.into_branches();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].default_priority(), dec!(0));
        assert_eq!(branches[1].default_priority(), dec!(0.5));
    }
}
