use std::marker::PhantomData;

use derivative::Derivative;

use super::token_stream::TokenStream;
use super::tokenizer::Token;

/// Handle to a node of kind `T` inside the [`AstContext`] that created it.
///
/// Handles are plain indices into per-kind, append-only storage, so they stay
/// valid as more nodes are added, but only against their own context.
#[derive(Derivative)]
#[derivative(
    Clone(bound = ""),
    Copy(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = ""),
    Debug(bound = "")
)]
pub struct Idx<T> {
    id: u32,
    #[derivative(Debug = "ignore")]
    _kind: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id: id as u32,
            _kind: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.id as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpressionIndex {
    Binary(Idx<Binary>),
    Logical(Idx<Logical>),
    Assign(Idx<Assign>),
    Unary(Idx<Unary>),
    Literal(Idx<Literal>),
    Grouping(Idx<Grouping>),
    Variable(Idx<Variable>),
    Call(Idx<Call>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementIndex {
    Expression(Idx<ExprStmt>),
    Print(Idx<PrintStmt>),
    Var(Idx<VarDecl>),
    Function(Idx<FunDecl>),
    Return(Idx<Return>),
    Block(Idx<Block>),
    If(Idx<If>),
    While(Idx<While>),
    Unit(Idx<Unit>),
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub op: Idx<Token>,
    pub left: ExpressionIndex,
    pub right: ExpressionIndex,
}

/// `and` / `or`, evaluated with short-circuiting.
#[derive(Debug, Clone)]
pub struct Logical {
    pub op: Idx<Token>,
    pub left: ExpressionIndex,
    pub right: ExpressionIndex,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub name: Idx<Token>,
    pub value: ExpressionIndex,
}

#[derive(Debug, Clone)]
pub struct Unary {
    pub op: Idx<Token>,
    pub operand: ExpressionIndex,
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: Idx<Token>,
}

#[derive(Debug, Clone)]
pub struct Grouping {
    pub begin: Idx<Token>,
    pub inner: ExpressionIndex,
    pub end: Idx<Token>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Idx<Token>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: ExpressionIndex,
    pub paren: Idx<Token>,
    pub args: Vec<ExpressionIndex>,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: ExpressionIndex,
}

#[derive(Debug, Clone)]
pub struct PrintStmt {
    pub expr: ExpressionIndex,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Idx<Token>,
    pub init: Option<ExpressionIndex>,
}

#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: Idx<Token>,
    pub params: Vec<Idx<Token>>,
    pub body: Vec<StatementIndex>,
}

#[derive(Debug, Clone)]
pub struct Return {
    pub keyword: Idx<Token>,
    pub value: Option<ExpressionIndex>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<StatementIndex>,
}

#[derive(Debug, Clone)]
pub struct If {
    pub condition: ExpressionIndex,
    pub then_branch: StatementIndex,
    pub else_branch: Option<StatementIndex>,
}

#[derive(Debug, Clone)]
pub struct While {
    pub condition: ExpressionIndex,
    pub body: StatementIndex,
}

/// Root of one parse.
#[derive(Debug, Clone)]
pub struct Unit {
    pub statements: Vec<StatementIndex>,
}

/// A node kind with its own storage in the arena.
pub trait Node: Sized {
    fn storage(ctx: &AstContext) -> &Vec<Self>;
    fn storage_mut(ctx: &mut AstContext) -> &mut Vec<Self>;
}

macro_rules! node_storage {
    ($($kind:ty => $field:ident),+ $(,)?) => {
        $(
            impl Node for $kind {
                fn storage(ctx: &AstContext) -> &Vec<Self> {
                    &ctx.$field
                }
                fn storage_mut(ctx: &mut AstContext) -> &mut Vec<Self> {
                    &mut ctx.$field
                }
            }
        )+
    };
}

node_storage! {
    Binary => binaries,
    Logical => logicals,
    Assign => assignments,
    Unary => unaries,
    Literal => literals,
    Grouping => groupings,
    Variable => variables,
    Call => calls,
    ExprStmt => expr_stmts,
    PrintStmt => prints,
    VarDecl => var_decls,
    FunDecl => fun_decls,
    Return => returns,
    Block => blocks,
    If => ifs,
    While => whiles,
    Unit => units,
}

/// Arena owning the tokens and every node parsed from them.
#[derive(Debug, Clone, Default)]
pub struct AstContext {
    tokens: TokenStream,

    binaries: Vec<Binary>,
    logicals: Vec<Logical>,
    assignments: Vec<Assign>,
    unaries: Vec<Unary>,
    literals: Vec<Literal>,
    groupings: Vec<Grouping>,
    variables: Vec<Variable>,
    calls: Vec<Call>,

    expr_stmts: Vec<ExprStmt>,
    prints: Vec<PrintStmt>,
    var_decls: Vec<VarDecl>,
    fun_decls: Vec<FunDecl>,
    returns: Vec<Return>,
    blocks: Vec<Block>,
    ifs: Vec<If>,
    whiles: Vec<While>,
    units: Vec<Unit>,
}

impl AstContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tokens(&mut self, batch: TokenStream) {
        self.tokens.append(batch);
    }

    pub fn tokens(&self) -> &TokenStream {
        &self.tokens
    }

    pub fn token(&self, idx: Idx<Token>) -> &Token {
        self.tokens.get(idx)
    }

    pub fn insert<T: Node>(&mut self, node: T) -> Idx<T> {
        let storage = T::storage_mut(self);
        storage.push(node);
        Idx::new(storage.len() - 1)
    }

    pub fn get<T: Node>(&self, idx: Idx<T>) -> &T {
        &T::storage(self)[idx.index()]
    }

    pub(super) fn make_binary(
        &mut self,
        left: ExpressionIndex,
        op: Idx<Token>,
        right: ExpressionIndex,
    ) -> ExpressionIndex {
        ExpressionIndex::Binary(self.insert(Binary { op, left, right }))
    }

    pub(super) fn make_logical(
        &mut self,
        left: ExpressionIndex,
        op: Idx<Token>,
        right: ExpressionIndex,
    ) -> ExpressionIndex {
        ExpressionIndex::Logical(self.insert(Logical { op, left, right }))
    }

    pub(super) fn make_literal(&mut self, value: Idx<Token>) -> ExpressionIndex {
        ExpressionIndex::Literal(self.insert(Literal { value }))
    }

    pub(super) fn make_expr_stmt(&mut self, expr: ExpressionIndex) -> StatementIndex {
        StatementIndex::Expression(self.insert(ExprStmt { expr }))
    }

    pub(super) fn make_block(&mut self, statements: Vec<StatementIndex>) -> StatementIndex {
        StatementIndex::Block(self.insert(Block { statements }))
    }

    pub(super) fn make_while(
        &mut self,
        condition: ExpressionIndex,
        body: StatementIndex,
    ) -> StatementIndex {
        StatementIndex::While(self.insert(While { condition, body }))
    }
}

impl<T: Node> std::ops::Index<Idx<T>> for AstContext {
    type Output = T;

    fn index(&self, idx: Idx<T>) -> &T {
        self.get(idx)
    }
}
