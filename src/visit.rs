/*!
Traversal of the AST.

Every variant is matched exhaustively, so adding a node kind can not silently leave selectors beneath it unvisited.
*/

use crate::expr::Node;
use crate::vec::InstantSelector;

/**
Mutable, fallible AST visitor.

Implementors only have to handle instant vector selectors; `visit_node` descends into every child of every node unless overridden.
Traversal stops at the first error.
*/
pub trait Visitor {
	type Error;

	fn visit_vector(&mut self, vector: &mut InstantSelector) -> Result<(), Self::Error>;

	fn visit_node(&mut self, node: &mut Node) -> Result<(), Self::Error> {
		walk(self, node)
	}
}

/// Visits the children of `node`, selectors included; range selectors are visited through their instant selector.
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, node: &mut Node) -> Result<(), V::Error> {
	match node {
		Node::Operator { x, y, .. } => {
			visitor.visit_node(x)?;
			visitor.visit_node(y)
		}
		Node::Unary { x, .. }
		| Node::Subquery { x, .. }
		| Node::Offset { x, .. }
		| Node::Paren(x) => visitor.visit_node(x),
		Node::Aggregation { args, .. } | Node::Function { args, .. } => {
			for arg in args {
				visitor.visit_node(arg)?;
			}
			Ok(())
		}
		Node::Vector(vector) => visitor.visit_vector(vector),
		Node::Matrix(matrix) => visitor.visit_vector(&mut matrix.vector),
		Node::Scalar(_) | Node::String(_) => Ok(()),
	}
}

fn collect<'a>(node: &'a Node, out: &mut Vec<&'a InstantSelector>) {
	match node {
		Node::Operator { x, y, .. } => {
			collect(x, out);
			collect(y, out);
		}
		Node::Unary { x, .. }
		| Node::Subquery { x, .. }
		| Node::Offset { x, .. }
		| Node::Paren(x) => collect(x, out),
		Node::Aggregation { args, .. } | Node::Function { args, .. } => {
			for arg in args {
				collect(arg, out);
			}
		}
		Node::Vector(vector) => out.push(vector),
		Node::Matrix(matrix) => out.push(&matrix.vector),
		Node::Scalar(_) | Node::String(_) => (),
	}
}

impl Node {
	/// Every instant selector in the tree (including those inside range selectors), in source order.
	pub fn vectors(&self) -> Vec<&InstantSelector> {
		let mut out = Vec::new();
		collect(self, &mut out);
		out
	}
}
