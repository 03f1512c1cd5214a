//! # Rules
//!
//! A [`Rule`] is an immutable descriptor: a name (used to look up its default
//! message), context data for message interpolation, a predicate, and two chains
//! of further rules. [`Rule::and`], [`Rule::or`] and [`Rule::format`] all return a
//! new descriptor, so rules can be declared once in a
//! [`ModelDefinition`](crate::model::ModelDefinition) and shared by every instance.
//!
//! ## Evaluation
//!
//! 1. The predicate and every `and` rule are evaluated together, and *all* of them
//!    settle before anything is decided.
//! 2. The first failure in declaration order (the predicate first) supplies the message.
//! 3. If something failed and there are `or` rules, they are evaluated together; any
//!    success makes the whole rule pass. Otherwise the failure message from step 2
//!    stands.

use crate::messages::{MessageContext, MessageFormat};
use crate::model::Model;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The result of a single predicate invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Failed; use the rule's message.
    Fail,
    /// Failed with an explicit message.
    Message(String),
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl From<()> for Verdict {
    fn from(_: ()) -> Self {
        Verdict::Pass
    }
}

impl From<String> for Verdict {
    fn from(message: String) -> Self {
        if message.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Message(message)
        }
    }
}

impl From<&str> for Verdict {
    fn from(message: &str) -> Self {
        Verdict::from(message.to_string())
    }
}

impl From<Option<String>> for Verdict {
    fn from(message: Option<String>) -> Self {
        message.map_or(Verdict::Pass, Verdict::from)
    }
}

/// A predicate result that may still be pending.
pub enum Check {
    Ready(Verdict),
    Pending(BoxFuture<'static, Verdict>),
}

impl Check {
    /// Wraps an asynchronous predicate body.
    pub fn pending<F, V>(future: F) -> Self
    where
        F: Future<Output = V> + Send + 'static,
        V: Into<Verdict> + 'static,
    {
        Check::Pending(future.map(Into::into).boxed())
    }

    async fn settle(self) -> Verdict {
        match self {
            Check::Ready(verdict) => verdict,
            Check::Pending(future) => future.await,
        }
    }
}

macro_rules! check_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Check {
                fn from(value: $ty) -> Self {
                    Check::Ready(Verdict::from(value))
                }
            }
        )*
    };
}

check_from!(bool, (), String, &str, Option<String>);

impl From<Verdict> for Check {
    fn from(verdict: Verdict) -> Self {
        Check::Ready(verdict)
    }
}

type Predicate = Arc<dyn Fn(&serde_json::Value, &str, &Model) -> Check + Send + Sync>;

/// A composable validation rule.
#[derive(Clone)]
pub struct Rule {
    name: String,
    data: MessageContext,
    predicate: Predicate,
    and_chain: Vec<Rule>,
    or_chain: Vec<Rule>,
    format: Option<MessageFormat>,
}

impl Rule {
    /// Creates a rule from a predicate receiving `(value, attribute, owner)`.
    pub fn new<F, C>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&serde_json::Value, &str, &Model) -> C + Send + Sync + 'static,
        C: Into<Check>,
    {
        Self {
            name: name.into(),
            data: MessageContext::new(),
            predicate: Arc::new(move |value, attribute, owner| predicate(value, attribute, owner).into()),
            and_chain: Vec::new(),
            or_chain: Vec::new(),
            format: None,
        }
    }

    /// Creates a rule from a synchronous test on the value alone.
    pub fn test<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&serde_json::Value) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |value: &serde_json::Value, _: &str, _: &Model| test(value))
    }

    /// Adds message context data while building a descriptor.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// A new rule that also requires `rule` to pass.
    pub fn and(&self, rule: Rule) -> Rule {
        let mut next = self.clone();
        next.and_chain.push(rule);
        next
    }

    /// A new rule that passes if this one fails but `rule` passes.
    pub fn or(&self, rule: Rule) -> Rule {
        let mut next = self.clone();
        next.or_chain.push(rule);
        next
    }

    /// A new rule with a custom failure message.
    pub fn format(&self, format: impl Into<MessageFormat>) -> Rule {
        let mut next = self.clone();
        next.format = Some(format.into());
        next
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &MessageContext {
        &self.data
    }

    pub fn and_chain(&self) -> &[Rule] {
        &self.and_chain
    }

    pub fn or_chain(&self) -> &[Rule] {
        &self.or_chain
    }

    /// Evaluates the rule and its chains. `Err` carries the failure message.
    pub fn check(
        &self,
        value: &serde_json::Value,
        attribute: &str,
        owner: &Model,
    ) -> BoxFuture<'static, Result<(), String>> {
        let base = self.evaluate(value, attribute, owner);
        let chained = join_all(self.and_chain.iter().map(|rule| rule.check(value, attribute, owner)));
        let alternatives: Vec<_> = self.or_chain.clone();
        let (value, attribute, owner) = (value.clone(), attribute.to_string(), owner.clone());

        async move {
            let (base, chained) = futures::join!(base, chained);
            let Some(message) = std::iter::once(base).chain(chained).find_map(Result::err) else {
                return Ok(());
            };
            if alternatives.is_empty() {
                return Err(message);
            }

            let outcomes = join_all(
                alternatives
                    .iter()
                    .map(|rule| rule.check(&value, &attribute, &owner)),
            )
            .await;
            if outcomes.iter().any(Result::is_ok) {
                Ok(())
            } else {
                Err(message)
            }
        }
        .boxed()
    }

    /// Runs this rule's own predicate only.
    fn evaluate(
        &self,
        value: &serde_json::Value,
        attribute: &str,
        owner: &Model,
    ) -> BoxFuture<'static, Result<(), String>> {
        let check = (self.predicate)(value, attribute, owner);
        let rule = self.clone();
        let (value, attribute, owner) = (value.clone(), attribute.to_string(), owner.clone());

        async move {
            match check.settle().await {
                Verdict::Pass => Ok(()),
                Verdict::Message(message) => Err(message),
                Verdict::Fail => Err(rule.message(&value, &attribute, &owner)),
            }
        }
        .boxed()
    }

    fn message(&self, value: &serde_json::Value, attribute: &str, owner: &Model) -> String {
        let mut context = self.data.clone();
        context.insert("attribute".to_string(), attribute.into());
        context.insert("value".to_string(), value.clone());

        match &self.format {
            Some(format) => format.render(&context),
            None => owner.messages().get(&self.name, &context),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("and_chain", &self.and_chain)
            .field("or_chain", &self.or_chain)
            .field("format", &self.format)
            .finish()
    }
}
